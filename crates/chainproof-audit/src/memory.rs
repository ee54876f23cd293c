//! In-memory implementation of `AuditStore`.
//!
//! `InMemoryAuditStore` keeps every record in a `Vec` behind a `Mutex`.
//! The lock is held across the tail comparison and the push, which makes
//! `compare_and_append` a single atomic step for all clones of the store.

use std::sync::{Arc, Mutex, MutexGuard};

use chainproof_contracts::{ChainproofError, ChainproofResult};
use chainproof_core::{AuditEvent, AuditStore, GENESIS_HASH};

// ── Internal mutable state ────────────────────────────────────────────────────

struct InMemoryState {
    /// All records in append order.
    events: Vec<AuditEvent>,
}

impl InMemoryState {
    fn tail(&self) -> &str {
        self.events
            .last()
            .map(|e| e.event_hash())
            .unwrap_or(GENESIS_HASH)
    }
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An append-only audit log held in memory.
///
/// Cloning shares the underlying log.
#[derive(Clone)]
pub struct InMemoryAuditStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState { events: Vec::new() })),
        }
    }

    fn lock(&self) -> ChainproofResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| ChainproofError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn tail_hash(&self) -> ChainproofResult<String> {
        Ok(self.lock()?.tail().to_string())
    }

    fn compare_and_append(&self, event: &AuditEvent) -> ChainproofResult<()> {
        let mut state = self.lock()?;
        if event.prev_hash() != state.tail() {
            return Err(ChainproofError::StaleTailConflict {
                assumed: event.prev_hash().to_string(),
                actual: state.tail().to_string(),
            });
        }
        state.events.push(event.clone());
        Ok(())
    }

    fn len(&self) -> ChainproofResult<usize> {
        Ok(self.lock()?.events.len())
    }

    fn snapshot(&self) -> ChainproofResult<Vec<AuditEvent>> {
        Ok(self.lock()?.events.clone())
    }
}
