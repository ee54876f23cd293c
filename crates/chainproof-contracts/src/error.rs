//! Error types for the chainproof audit chain.
//!
//! Every fallible operation returns `ChainproofResult<T>`.  Verification
//! variants carry enough positional context (index, event id, slot, path)
//! to support a forensic investigation of a rejected log or bundle.

use thiserror::Error;

/// The unified error type for chainproof.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainproofError {
    /// A value tree violates the canonicalization constraints.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// An append was attempted against a tail hash that is no longer current.
    ///
    /// The only retryable condition: reread the tail and try again.
    #[error("stale tail: append assumed tail {assumed} but current tail is {actual}")]
    StaleTailConflict { assumed: String, actual: String },

    /// A record's `prev_hash` does not link to its predecessor.
    #[error(
        "chain broken at position {position} (event {event_id}): expected prev_hash {expected}, found {found}"
    )]
    ChainBroken {
        position: usize,
        event_id: String,
        expected: String,
        found: String,
    },

    /// A record's stored `event_hash` disagrees with the recomputed value.
    #[error(
        "hash mismatch at position {position} (event {event_id}): stored {stored}, computed {computed}"
    )]
    HashMismatch {
        position: usize,
        event_id: String,
        stored: String,
        computed: String,
    },

    /// The computed head hash disagrees with the expected one.
    #[error("head hash mismatch: expected {expected}, computed {computed}")]
    HeadMismatch { expected: String, computed: String },

    /// A file's bytes disagree with the digest recorded for it.
    ///
    /// `slot_name` is set for manifest documents and empty for the audit log
    /// and checksum listing entries.
    #[error("checksum mismatch for {path}{}: expected {expected}, actual {actual}", slot_suffix(.slot_name))]
    ChecksumMismatch {
        path: String,
        slot_name: Option<String>,
        expected: String,
        actual: String,
    },

    /// The manifest is missing fields or is structurally invalid.
    #[error("manifest malformed: {reason}")]
    ManifestMalformed { reason: String },

    /// A line of the event log could not be parsed as an audit event.
    #[error("malformed audit record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// A bundled file referenced by the manifest could not be read.
    #[error("document unreadable at {path}: {reason}")]
    DocumentUnreadable { path: String, reason: String },

    /// Verification was aborted before it finished.
    #[error("verification cancelled at position {position}")]
    Cancelled { position: usize },

    /// The event could not be durably appended.
    ///
    /// Callers must treat this as blocking: an action that cannot be
    /// logged must not complete.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// An I/O operation failed outside of the cases above.
    #[error("i/o error: {reason}")]
    Io { reason: String },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl ChainproofError {
    /// True only for `StaleTailConflict`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChainproofError::StaleTailConflict { .. })
    }

    /// True for the failures that mean the verified bytes were tampered with
    /// or do not match their commitments.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            ChainproofError::ChainBroken { .. }
                | ChainproofError::HashMismatch { .. }
                | ChainproofError::HeadMismatch { .. }
                | ChainproofError::ChecksumMismatch { .. }
        )
    }
}

fn slot_suffix(slot_name: &Option<String>) -> String {
    match slot_name {
        Some(slot) => format!(" (slot '{slot}')"),
        None => String::new(),
    }
}

impl From<std::io::Error> for ChainproofError {
    fn from(e: std::io::Error) -> Self {
        ChainproofError::Io {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the chainproof crates.
pub type ChainproofResult<T> = Result<T, ChainproofError>;
