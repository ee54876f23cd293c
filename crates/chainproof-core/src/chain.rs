//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   2. canonical JSON of the event's non-hash fields
//!
//! Verification is a single left-to-right pass that stops at the first
//! divergence.  Each step depends on every prior step, so deletion,
//! reordering, truncation against a known head, and mutation are all
//! detected.

use std::io::{self, BufRead};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use chainproof_contracts::{CanonicalValue, ChainOutcome, ChainproofError, ChainproofResult};

use crate::cancel::CancelToken;
use crate::canonical::to_canonical_bytes;
use crate::event::{AuditEvent, GENESIS_HASH};

/// Compute `SHA-256(prev_hash ‖ canonical(body))` as lowercase hex.
pub fn hash_event(prev_hash: &str, body: &CanonicalValue) -> ChainproofResult<String> {
    let canonical = to_canonical_bytes(body)?;
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ── Incremental verifier ──────────────────────────────────────────────────────

/// Replays a chain one event at a time with constant memory per step.
///
/// Feed events in log order with `push`; the first error is terminal and
/// the verifier should be dropped.  `finish` applies the optional head
/// check and yields the outcome.
#[derive(Debug, Clone)]
pub struct ChainVerifier {
    expected_prev: String,
    position: usize,
    expected_head: Option<String>,
}

impl ChainVerifier {
    /// A verifier that starts at the genesis hash with no head expectation.
    pub fn new() -> Self {
        Self {
            expected_prev: GENESIS_HASH.to_string(),
            position: 0,
            expected_head: None,
        }
    }

    /// A verifier whose `finish` requires the computed head to equal
    /// `head`.
    pub fn expecting_head(head: impl Into<String>) -> Self {
        Self {
            expected_head: Some(head.into()),
            ..Self::new()
        }
    }

    /// Number of events accepted so far; also the position of the next
    /// event.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Check one event against the running expectation.
    pub fn push(&mut self, event: &AuditEvent) -> ChainproofResult<()> {
        // Rule 1: the stored prev_hash must link to what we computed last.
        if event.prev_hash() != self.expected_prev {
            return Err(ChainproofError::ChainBroken {
                position: self.position,
                event_id: event.event_id().to_string(),
                expected: self.expected_prev.clone(),
                found: event.prev_hash().to_string(),
            });
        }

        // Rule 2: recompute the hash from our own running value, never from
        // anything the record claims.
        let computed = hash_event(&self.expected_prev, &event.canonical_value())?;
        if computed != event.event_hash() {
            return Err(ChainproofError::HashMismatch {
                position: self.position,
                event_id: event.event_id().to_string(),
                stored: event.event_hash().to_string(),
                computed,
            });
        }

        debug!(
            position = self.position,
            event_id = %event.event_id(),
            event_hash = %computed,
            "audit event verified"
        );
        self.expected_prev = computed;
        self.position += 1;
        Ok(())
    }

    /// Apply the head check and report the outcome.
    ///
    /// An empty chain yields `ChainOutcome::Empty`; a supplied head must
    /// still equal the genesis hash in that case.
    pub fn finish(self) -> ChainproofResult<ChainOutcome> {
        if let Some(expected) = self.expected_head {
            if expected != self.expected_prev {
                return Err(ChainproofError::HeadMismatch {
                    expected,
                    computed: self.expected_prev,
                });
            }
        }

        if self.position == 0 {
            return Ok(ChainOutcome::Empty);
        }
        Ok(ChainOutcome::Verified {
            head_hash: self.expected_prev,
            event_count: self.position,
        })
    }
}

impl Default for ChainVerifier {
    fn default() -> Self {
        Self::new()
    }
}

// ── Whole-chain helpers ───────────────────────────────────────────────────────

/// Verify an in-memory sequence of events.
pub fn verify_chain(
    events: &[AuditEvent],
    expected_head: Option<&str>,
) -> ChainproofResult<ChainOutcome> {
    let mut verifier = match expected_head {
        Some(head) => ChainVerifier::expecting_head(head),
        None => ChainVerifier::new(),
    };
    for event in events {
        verifier.push(event)?;
    }
    verifier.finish()
}

/// Verify a JSON Lines event log without buffering it.
///
/// `cancel` is checked before each record; a cancelled run returns
/// `Cancelled` at the position it reached.
pub fn verify_jsonl<R: BufRead>(
    reader: R,
    expected_head: Option<&str>,
    cancel: &CancelToken,
) -> ChainproofResult<ChainOutcome> {
    let verifier = match expected_head {
        Some(head) => ChainVerifier::expecting_head(head),
        None => ChainVerifier::new(),
    };
    let result = replay(JsonlEvents::new(reader), verifier, cancel);

    match &result {
        Ok(ChainOutcome::Verified {
            head_hash,
            event_count,
        }) => info!(%head_hash, event_count, "audit chain verified"),
        Ok(ChainOutcome::Empty) => info!("audit chain is empty"),
        Err(error) => warn!(%error, "audit chain verification failed"),
    }
    result
}

fn replay<I>(
    events: I,
    mut verifier: ChainVerifier,
    cancel: &CancelToken,
) -> ChainproofResult<ChainOutcome>
where
    I: IntoIterator<Item = ChainproofResult<AuditEvent>>,
{
    for event in events {
        if cancel.is_cancelled() {
            return Err(ChainproofError::Cancelled {
                position: verifier.position(),
            });
        }
        verifier.push(&event?)?;
    }
    verifier.finish()
}

// ── JSON Lines reader ─────────────────────────────────────────────────────────

/// Iterates the records of a JSON Lines event log, skipping blank lines.
///
/// Reuses one line buffer, so memory use is bounded by the longest record.
pub struct JsonlEvents<R> {
    reader: R,
    line: String,
    line_no: usize,
    done: bool,
}

impl<R: BufRead> JsonlEvents<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for JsonlEvents<R> {
    type Item = ChainproofResult<AuditEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.line.clear();
            self.line_no += 1;
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let line = self.line_no;
                    let parsed = serde_json::from_str::<AuditEvent>(trimmed)
                        .map_err(|e| ChainproofError::MalformedRecord {
                            line,
                            reason: e.to_string(),
                        })
                        .and_then(|event| {
                            if event.payload().is_object() {
                                Ok(event)
                            } else {
                                Err(ChainproofError::MalformedRecord {
                                    line,
                                    reason: format!(
                                        "payload must be an object, got {}",
                                        event.payload().kind()
                                    ),
                                })
                            }
                        });
                    if parsed.is_err() {
                        self.done = true;
                    }
                    return Some(parsed);
                }
                Err(e) => {
                    self.done = true;
                    let error = if e.kind() == io::ErrorKind::InvalidData {
                        ChainproofError::MalformedRecord {
                            line: self.line_no,
                            reason: "line is not valid UTF-8".to_string(),
                        }
                    } else {
                        ChainproofError::from(e)
                    };
                    return Some(Err(error));
                }
            }
        }
        None
    }
}
