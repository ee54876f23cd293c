//! Verification outcome and report types.
//!
//! Chain verification yields a `ChainOutcome` on success and a
//! `ChainproofError` on the first divergence.  Bundle verification runs
//! every check and collects the failures into a `BundleReport`; the bundle
//! is accepted only when that list is empty.

use crate::error::ChainproofError;

/// Result of replaying a chain that did not diverge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every event linked and hashed correctly.
    Verified {
        /// `event_hash` of the last event.
        head_hash: String,
        event_count: usize,
    },
    /// The stream held no events.  Neither success nor failure; the caller
    /// decides whether an empty log is acceptable.
    Empty,
}

impl ChainOutcome {
    /// The verified head hash, if any events were present.
    pub fn head_hash(&self) -> Option<&str> {
        match self {
            ChainOutcome::Verified { head_hash, .. } => Some(head_hash),
            ChainOutcome::Empty => None,
        }
    }

    pub fn event_count(&self) -> usize {
        match self {
            ChainOutcome::Verified { event_count, .. } => *event_count,
            ChainOutcome::Empty => 0,
        }
    }
}

/// Everything a bundle verification found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    /// Chain outcome, when the chain replay completed without divergence.
    pub chain: Option<ChainOutcome>,
    /// SHA-256 of the audit log bytes as actually read.
    pub audit_events_sha256: Option<String>,
    /// Number of manifest documents that were hashed.
    pub documents_checked: usize,
    /// Every mismatch found, in the order the checks ran.  Empty on accept.
    pub rejections: Vec<ChainproofError>,
}

impl BundleReport {
    /// True only if no check failed.  There is no partial acceptance.
    pub fn accepted(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn reject(&mut self, error: ChainproofError) {
        self.rejections.push(error);
    }
}
