//! # chainproof-audit
//!
//! Append-only, SHA-256 hash-chained audit log writers.
//!
//! ## Overview
//!
//! Every privileged action is recorded through a `ChainAppender`, which
//! seals the event against the current tail and commits it with the
//! store's atomic compare-and-append.  Two stores are provided:
//! `InMemoryAuditStore` and the file-backed `JsonlAuditStore`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chainproof_audit::{ChainAppender, JsonlAuditStore};
//! use chainproof_contracts::{CanonicalValue, Tier};
//!
//! let appender = ChainAppender::new(JsonlAuditStore::open("audit.jsonl")?);
//! let event = appender.append_event("actor-1", "case.export", Tier::Amber, None, payload)?;
//! ```

pub mod appender;
pub mod jsonl;
pub mod memory;

pub use appender::{ChainAppender, DEFAULT_MAX_RETRIES};
pub use jsonl::JsonlAuditStore;
pub use memory::InMemoryAuditStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;

    use chainproof_contracts::{
        CanonicalValue, ChainOutcome, ChainproofError, ChainproofResult, Tier,
    };
    use chainproof_core::{
        verify_chain, verify_jsonl, AuditEvent, AuditStore, CancelToken, EventFields, GENESIS_HASH,
    };

    use super::{ChainAppender, InMemoryAuditStore, JsonlAuditStore, DEFAULT_MAX_RETRIES};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn payload(n: i64) -> CanonicalValue {
        CanonicalValue::try_object([("n", CanonicalValue::from(n))]).unwrap()
    }

    fn fields(id: &str) -> EventFields {
        EventFields {
            event_id: id.to_string(),
            actor_principal_id: "actor-1".to_string(),
            action: "case.update".to_string(),
            tier: Tier::Amber,
            case_id: Some("case-1".to_string()),
            created_at: "2024-03-01T09:00:00.000000Z".to_string(),
            payload: payload(1),
        }
    }

    // ── In-memory store ───────────────────────────────────────────────────────

    /// The first appended event links to the genesis hash.
    #[test]
    fn test_first_event_links_to_genesis() {
        let appender = ChainAppender::new(InMemoryAuditStore::new());
        let event = appender
            .append_event("actor-1", "case.create", Tier::Green, None, payload(1))
            .unwrap();

        assert_eq!(event.prev_hash(), GENESIS_HASH);
        assert_eq!(appender.store().tail_hash().unwrap(), event.event_hash());
    }

    /// Sequential appends produce a chain that verifies to the last hash.
    #[test]
    fn test_appended_chain_verifies() {
        let appender = ChainAppender::new(InMemoryAuditStore::new());
        let mut last = String::new();
        for n in 0..5 {
            last = appender
                .append_event("actor-1", "case.update", Tier::Red, Some("case-9".into()), payload(n))
                .unwrap()
                .event_hash()
                .to_string();
        }

        let events = appender.store().snapshot().unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(
            verify_chain(&events, Some(last.as_str())).unwrap(),
            ChainOutcome::Verified {
                head_hash: last.clone(),
                event_count: 5,
            }
        );
    }

    /// Appending against an outdated tail is rejected and changes nothing.
    #[test]
    fn test_stale_tail_is_rejected() {
        let appender = ChainAppender::new(InMemoryAuditStore::new());
        appender.append(fields("evt-1"), GENESIS_HASH).unwrap();

        let err = appender.append(fields("evt-2"), GENESIS_HASH).unwrap_err();
        assert!(err.is_retryable(), "stale tail must be retryable, got {:?}", err);
        assert!(matches!(err, ChainproofError::StaleTailConflict { .. }));
        assert_eq!(appender.store().len().unwrap(), 1, "store must be unchanged");
    }

    /// Non-object payloads are input errors, not write failures.
    #[test]
    fn test_non_object_payload_is_serialization_error() {
        let appender = ChainAppender::new(InMemoryAuditStore::new());
        let err = appender
            .append_event("actor-1", "case.create", Tier::Green, None, CanonicalValue::from(5))
            .unwrap_err();
        assert!(matches!(err, ChainproofError::Serialization { .. }));
        assert!(appender.store().is_empty().unwrap());
    }

    /// Event ids are unique and timestamps are RFC 3339 UTC.
    #[test]
    fn test_append_event_stamps_id_and_time() {
        let appender = ChainAppender::new(InMemoryAuditStore::new());
        let a = appender
            .append_event("actor-1", "a", Tier::Green, None, payload(1))
            .unwrap();
        let b = appender
            .append_event("actor-1", "b", Tier::Green, None, payload(2))
            .unwrap();

        assert_ne!(a.event_id(), b.event_id());
        assert!(a.created_at().ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(a.created_at()).is_ok());
    }

    /// Many threads appending at once still produce one linear chain.
    #[test]
    fn test_concurrent_appends_never_fork() {
        let appender = Arc::new(
            ChainAppender::new(InMemoryAuditStore::new()).with_max_retries(u32::MAX),
        );

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let appender = Arc::clone(&appender);
                thread::spawn(move || {
                    for n in 0..25 {
                        appender
                            .append_event(format!("actor-{t}"), "case.update", Tier::Green, None, payload(n))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = appender.store().snapshot().unwrap();
        assert_eq!(events.len(), 200);
        let outcome = verify_chain(&events, None).unwrap();
        assert_eq!(outcome.event_count(), 200, "every append must extend one chain");
    }

    // ── Failure mapping ───────────────────────────────────────────────────────

    /// A store whose every commit fails with a fixed error.
    struct FailingStore {
        error: ChainproofError,
        attempts: AtomicU32,
    }

    impl FailingStore {
        fn new(error: ChainproofError) -> Self {
            Self {
                error,
                attempts: AtomicU32::new(0),
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl AuditStore for FailingStore {
        fn tail_hash(&self) -> ChainproofResult<String> {
            Ok(GENESIS_HASH.to_string())
        }

        fn compare_and_append(&self, _event: &AuditEvent) -> ChainproofResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }

        fn len(&self) -> ChainproofResult<usize> {
            Ok(0)
        }

        fn snapshot(&self) -> ChainproofResult<Vec<AuditEvent>> {
            Ok(Vec::new())
        }
    }

    fn stale() -> ChainproofError {
        ChainproofError::StaleTailConflict {
            assumed: GENESIS_HASH.to_string(),
            actual: "a".repeat(64),
        }
    }

    /// A tail that never stops moving exhausts the retries and blocks the
    /// action with `AuditWriteFailed`.
    #[test]
    fn test_exhausted_retries_are_write_failures() {
        let appender = ChainAppender::new(FailingStore::new(stale())).with_max_retries(3);
        let err = appender
            .append_event("actor-1", "case.update", Tier::Green, None, payload(1))
            .unwrap_err();

        match err {
            ChainproofError::AuditWriteFailed { reason } => {
                assert!(reason.contains("stale tail"), "got: {reason}")
            }
            other => panic!("expected AuditWriteFailed, got {:?}", other),
        }
        assert_eq!(appender.store().attempts(), 4, "one attempt plus three retries");
    }

    /// The default bound allows eight retries.
    #[test]
    fn test_default_retry_bound() {
        let appender = ChainAppender::new(FailingStore::new(stale()));
        assert!(appender
            .append_event("actor-1", "case.update", Tier::Green, None, payload(1))
            .is_err());
        assert_eq!(appender.store().attempts(), DEFAULT_MAX_RETRIES + 1);
    }

    /// Store failures other than a stale tail are not retried and surface
    /// as `AuditWriteFailed`.
    #[test]
    fn test_store_io_failure_is_write_failure() {
        let appender = ChainAppender::new(FailingStore::new(ChainproofError::Io {
            reason: "disk full".to_string(),
        }));
        let err = appender
            .append_event("actor-1", "case.update", Tier::Green, None, payload(1))
            .unwrap_err();

        assert!(matches!(err, ChainproofError::AuditWriteFailed { ref reason } if reason.contains("disk full")));
        assert_eq!(appender.store().attempts(), 1);
    }

    /// A serialization failure passes through unwrapped.
    #[test]
    fn test_serialization_error_is_not_wrapped() {
        let appender = ChainAppender::new(FailingStore::new(ChainproofError::Serialization {
            reason: "bad payload".to_string(),
        }));
        let err = appender
            .append_event("actor-1", "case.update", Tier::Green, None, payload(1))
            .unwrap_err();

        assert_eq!(
            err,
            ChainproofError::Serialization {
                reason: "bad payload".to_string()
            }
        );
        assert_eq!(appender.store().attempts(), 1);
    }

    /// The raw append path also refuses non-object payloads.
    #[test]
    fn test_raw_append_rejects_non_object_payload() {
        let appender = ChainAppender::new(InMemoryAuditStore::new());
        let mut bad = fields("evt-1");
        bad.payload = CanonicalValue::from(5);

        let err = appender.append(bad, GENESIS_HASH).unwrap_err();
        assert!(matches!(err, ChainproofError::Serialization { .. }), "got {:?}", err);
        assert!(appender.store().is_empty().unwrap());
    }

    // ── JSON Lines store ──────────────────────────────────────────────────────

    /// Records persist across reopen and the file verifies as a stream.
    #[test]
    fn test_jsonl_store_persists_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");

        let head = {
            let appender = ChainAppender::new(JsonlAuditStore::open(&path).unwrap());
            appender
                .append_event("actor-1", "case.create", Tier::Green, None, payload(1))
                .unwrap();
            appender
                .append_event("actor-1", "case.close", Tier::Red, Some("case-1".into()), payload(2))
                .unwrap()
                .event_hash()
                .to_string()
        };

        let store = JsonlAuditStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.tail_hash().unwrap(), head);

        let outcome = verify_jsonl(store.reader().unwrap(), Some(head.as_str()), &CancelToken::new()).unwrap();
        assert_eq!(outcome.head_hash(), Some(head.as_str()));
    }

    /// An empty file has the genesis tail.
    #[test]
    fn test_jsonl_store_empty_tail_is_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlAuditStore::open(dir.path().join("audit.jsonl")).unwrap();
        assert_eq!(store.tail_hash().unwrap(), GENESIS_HASH);
        assert!(store.is_empty().unwrap());
    }

    /// A second handle on the same file sees the first handle's appends.
    #[test]
    fn test_jsonl_store_detects_foreign_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let first = ChainAppender::new(JsonlAuditStore::open(&path).unwrap());
        let second = ChainAppender::new(JsonlAuditStore::open(&path).unwrap());

        // Prime the second handle's cache at genesis.
        assert_eq!(second.store().tail_hash().unwrap(), GENESIS_HASH);
        first.append(fields("evt-1"), GENESIS_HASH).unwrap();

        let err = second.append(fields("evt-2"), GENESIS_HASH).unwrap_err();
        assert!(matches!(err, ChainproofError::StaleTailConflict { .. }));

        second
            .append_event("actor-2", "case.update", Tier::Green, None, payload(3))
            .unwrap();
        let events = first.store().snapshot().unwrap();
        assert_eq!(events.len(), 2);
        assert!(verify_chain(&events, None).is_ok());
    }

    /// A log written without a trailing newline is extended on a new line.
    #[test]
    fn test_jsonl_store_appends_after_unterminated_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let seed = AuditEvent::seal(fields("evt-1"), GENESIS_HASH).unwrap();
        std::fs::write(&path, seed.to_json_line().unwrap()).unwrap();

        let appender = ChainAppender::new(JsonlAuditStore::open(&path).unwrap());
        appender
            .append_event("actor-1", "case.update", Tier::Green, None, payload(2))
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        let outcome = verify_jsonl(raw.as_bytes(), None, &CancelToken::new()).unwrap();
        assert_eq!(outcome.event_count(), 2);
    }
}
