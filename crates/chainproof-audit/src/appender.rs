//! The chain appender: the only producer-side path into an `AuditStore`.
//!
//! `ChainAppender::append` seals an event against a caller-assumed tail and
//! commits it with the store's compare-and-append.  `append_event` is the
//! producer-facing API: it stamps the event id and timestamp, reads the
//! tail, and retries on `StaleTailConflict` with a freshly read tail.
//!
//! Everything other than a payload that cannot be canonicalized surfaces
//! from `append_event` as `AuditWriteFailed`.  Callers must treat that as
//! blocking: an action that cannot be logged must not complete.

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use chainproof_contracts::{CanonicalValue, ChainproofError, ChainproofResult, Tier};
use chainproof_core::{AuditEvent, AuditStore, EventFields};

/// Default bound on stale-tail retries in `append_event`.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Serializes appends to one store.
pub struct ChainAppender<S: AuditStore> {
    store: S,
    max_retries: u32,
}

impl<S: AuditStore> ChainAppender<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Override the number of stale-tail retries `append_event` attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The underlying store, for reads.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Seal `fields` against `assumed_tail` and commit.
    ///
    /// Pass `GENESIS_HASH` as the tail for the first record.  Returns
    /// `StaleTailConflict` when `assumed_tail` is no longer the store's tail;
    /// the store is then unchanged.
    pub fn append(&self, fields: EventFields, assumed_tail: &str) -> ChainproofResult<AuditEvent> {
        let event = AuditEvent::seal(fields, assumed_tail)?;
        self.store.compare_and_append(&event)?;
        debug!(
            event_id = %event.event_id(),
            action = %event.action(),
            prev_hash = %event.prev_hash(),
            event_hash = %event.event_hash(),
            "audit event appended"
        );
        Ok(event)
    }

    /// Record one privileged action.
    ///
    /// `payload` must be an object; `AuditEvent::seal` rejects anything
    /// else.  The event id is a fresh UUID v4 and `created_at` is the
    /// current UTC time in RFC 3339 with microseconds.
    pub fn append_event(
        &self,
        actor_principal_id: impl Into<String>,
        action: impl Into<String>,
        tier: Tier,
        case_id: Option<String>,
        payload: CanonicalValue,
    ) -> ChainproofResult<AuditEvent> {
        let fields = EventFields {
            event_id: Uuid::new_v4().to_string(),
            actor_principal_id: actor_principal_id.into(),
            action: action.into(),
            tier,
            case_id,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            payload,
        };

        let mut attempt = 0;
        loop {
            let tail = self.store.tail_hash().map_err(write_failed)?;
            match self.append(fields.clone(), &tail) {
                Ok(event) => return Ok(event),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_id = %fields.event_id,
                        attempt,
                        error = %e,
                        "stale audit tail; retrying with fresh tail"
                    );
                }
                Err(e @ ChainproofError::Serialization { .. }) => return Err(e),
                Err(e) => return Err(write_failed(e)),
            }
        }
    }
}

fn write_failed(e: ChainproofError) -> ChainproofError {
    match e {
        e @ ChainproofError::AuditWriteFailed { .. } => e,
        other => ChainproofError::AuditWriteFailed {
            reason: other.to_string(),
        },
    }
}
