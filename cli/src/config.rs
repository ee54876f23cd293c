//! TOML configuration for the `chainproof` binary.
//!
//! Every field has a default, so a config file is optional and may set
//! only the values it cares about:
//!
//! ```toml
//! [bundle]
//! audit_log_name = "events.jsonl"
//!
//! [verify]
//! timeout_secs = 30
//!
//! [append]
//! max_retries = 16
//! ```
//!
//! Command-line flags override values loaded here.

use std::path::Path;

use serde::Deserialize;

use chainproof_audit::DEFAULT_MAX_RETRIES;
use chainproof_contracts::{ChainproofError, ChainproofResult};
use chainproof_verify::BundleLayout;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainproofConfig {
    pub bundle: BundleSection,
    pub verify: VerifySection,
    pub append: AppendSection,
}

/// File names inside an export bundle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleSection {
    pub manifest_name: String,
    pub audit_log_name: String,
    pub checksums_name: String,
}

impl Default for BundleSection {
    fn default() -> Self {
        let layout = BundleLayout::default();
        Self {
            manifest_name: layout.manifest_name,
            audit_log_name: layout.audit_log_name,
            checksums_name: layout.checksums_name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifySection {
    /// Abort verification after this many seconds.  Unset means no limit.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppendSection {
    /// Stale-tail retries before an append fails.
    pub max_retries: u32,
}

impl Default for AppendSection {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ChainproofConfig {
    /// Parse `s` as TOML configuration.
    ///
    /// Returns `ChainproofError::Config` if the TOML is malformed, names an
    /// unknown key, or leaves a bundle file name empty.
    pub fn from_toml_str(s: &str) -> ChainproofResult<Self> {
        let config: ChainproofConfig = toml::from_str(s).map_err(|e| ChainproofError::Config {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML configuration.
    pub fn from_file(path: &Path) -> ChainproofResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ChainproofError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The bundle layout these settings describe.
    pub fn layout(&self) -> BundleLayout {
        BundleLayout {
            manifest_name: self.bundle.manifest_name.clone(),
            audit_log_name: self.bundle.audit_log_name.clone(),
            checksums_name: self.bundle.checksums_name.clone(),
        }
    }

    fn validate(&self) -> ChainproofResult<()> {
        let names = [
            ("bundle.manifest_name", &self.bundle.manifest_name),
            ("bundle.audit_log_name", &self.bundle.audit_log_name),
            ("bundle.checksums_name", &self.bundle.checksums_name),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(ChainproofError::Config {
                    reason: format!("{key} must not be empty"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ChainproofConfig::from_toml_str("").unwrap();
        assert_eq!(config, ChainproofConfig::default());
        assert_eq!(config.layout(), BundleLayout::default());
        assert_eq!(config.append.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.verify.timeout_secs, None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ChainproofConfig::from_toml_str(
            r#"
            [bundle]
            audit_log_name = "events.jsonl"

            [verify]
            timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.bundle.audit_log_name, "events.jsonl");
        assert_eq!(config.bundle.manifest_name, "manifest.json");
        assert_eq!(config.verify.timeout_secs, Some(30));
        assert_eq!(config.append.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn unknown_key_is_config_error() {
        let err = ChainproofConfig::from_toml_str("[append]\nretries = 3\n").unwrap_err();
        assert!(
            matches!(err, ChainproofError::Config { .. }),
            "expected Config error, got {:?}",
            err
        );
    }

    #[test]
    fn empty_file_name_is_rejected() {
        let err = ChainproofConfig::from_toml_str("[bundle]\nmanifest_name = \"\"\n").unwrap_err();
        assert!(err.to_string().contains("bundle.manifest_name"), "got: {err}");
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ChainproofConfig::from_file(Path::new("/nonexistent/chainproof.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
