//! Sensitivity tier attached to each audit event.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChainproofError;

/// Sensitivity classification of an audited action.
///
/// The tier only governs handling policy outside the chain; inside the
/// chain it is hashed as its lowercase label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Green,
    Amber,
    Red,
}

impl Tier {
    /// The lowercase wire label (`"green"`, `"amber"`, `"red"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Green => "green",
            Tier::Amber => "amber",
            Tier::Red => "red",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ChainproofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "green" => Ok(Tier::Green),
            "amber" => Ok(Tier::Amber),
            "red" => Ok(Tier::Red),
            other => Err(ChainproofError::Serialization {
                reason: format!("unknown tier '{other}' (expected green, amber, or red)"),
            }),
        }
    }
}
