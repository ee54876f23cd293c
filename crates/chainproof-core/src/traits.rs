//! Trait definitions for the byte boundaries of the chain.
//!
//! These two traits are the whole contract with the outside world:
//!
//! - `AuditStore`: the append-only log (producer side, serialized)
//! - `DocumentSource`: bundled file bytes (consumer side, read-only)
//!
//! The core never decides where bytes live; implementations do.

use std::io::Read;

use chainproof_contracts::ChainproofResult;

use crate::event::AuditEvent;

/// The append-only audit log.
///
/// There is one global chain per store.  The only mutating operation is
/// `compare_and_append`; stores expose no way to update or delete a
/// record once written.
pub trait AuditStore: Send + Sync {
    /// The `event_hash` of the last record, or `GENESIS_HASH` when empty.
    fn tail_hash(&self) -> ChainproofResult<String>;

    /// Persist `event` if and only if its `prev_hash` is the current tail.
    ///
    /// Reading the tail and writing the record must be one mutually
    /// exclusive step, so two writers can never both extend the same tail.
    /// Returns `StaleTailConflict` when the tail has moved.  On any error
    /// the log must be left exactly as it was.
    fn compare_and_append(&self, event: &AuditEvent) -> ChainproofResult<()>;

    /// Number of records in the log.
    fn len(&self) -> ChainproofResult<usize>;

    /// True when the log holds no records.
    fn is_empty(&self) -> ChainproofResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Every record in append order.
    fn snapshot(&self) -> ChainproofResult<Vec<AuditEvent>>;
}

/// Supplies the bytes of files inside an export bundle.
///
/// Implementations return `DocumentUnreadable` when a path cannot be
/// opened.  The bundle verifier streams from the returned reader.
pub trait DocumentSource {
    /// Open the file at `bundle_path` (relative to the bundle root).
    fn open(&self, bundle_path: &str) -> ChainproofResult<Box<dyn Read + '_>>;
}
