//! Audit event types.
//!
//! `EventFields` is everything a producer supplies about an event.
//! `AuditEvent` is the sealed, hash-linked record: it can only be built by
//! `AuditEvent::seal`, which computes `event_hash` itself, and its fields
//! are private with read-only accessors, so a record cannot be altered in
//! place once created.  Records read back from a log are deserialized
//! as-is and must be checked with the chain verifier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chainproof_contracts::{CanonicalValue, ChainproofError, ChainproofResult, Tier};

use crate::chain::hash_event;

/// The `prev_hash` of the first record in every chain: 64 ASCII zeros.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// The non-hash fields of an event, as supplied to the appender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFields {
    pub event_id: String,
    pub actor_principal_id: String,
    pub action: String,
    pub tier: Tier,
    pub case_id: Option<String>,
    /// RFC 3339 timestamp string.  Hashed exactly as stored.
    pub created_at: String,
    pub payload: CanonicalValue,
}

impl EventFields {
    /// The value tree that is canonicalized and hashed for this event.
    pub fn canonical_value(&self) -> CanonicalValue {
        body_value(BodyRef {
            event_id: &self.event_id,
            actor_principal_id: &self.actor_principal_id,
            action: &self.action,
            tier: self.tier,
            case_id: self.case_id.as_deref(),
            created_at: &self.created_at,
            payload: &self.payload,
        })
    }
}

/// One sealed entry in the audit hash chain.
///
/// Serialized as one JSON Lines record; field order follows the log line
/// format.  Unknown fields are rejected on read because they would sit
/// outside the hashed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditEvent {
    action: String,
    actor_principal_id: String,
    case_id: Option<String>,
    created_at: String,
    event_id: String,
    payload: CanonicalValue,
    tier: Tier,
    prev_hash: String,
    event_hash: String,
}

impl AuditEvent {
    /// Link `fields` to `prev_hash` and compute `event_hash`.
    ///
    /// The payload must be an object; anything else is `Serialization`.
    pub fn seal(fields: EventFields, prev_hash: impl Into<String>) -> ChainproofResult<Self> {
        if !fields.payload.is_object() {
            return Err(ChainproofError::Serialization {
                reason: format!(
                    "event payload must be an object, got {}",
                    fields.payload.kind()
                ),
            });
        }
        let prev_hash = prev_hash.into();
        let event_hash = hash_event(&prev_hash, &fields.canonical_value())?;
        let EventFields {
            event_id,
            actor_principal_id,
            action,
            tier,
            case_id,
            created_at,
            payload,
        } = fields;
        Ok(Self {
            action,
            actor_principal_id,
            case_id,
            created_at,
            event_id,
            payload,
            tier,
            prev_hash,
            event_hash,
        })
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn actor_principal_id(&self) -> &str {
        &self.actor_principal_id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn case_id(&self) -> Option<&str> {
        self.case_id.as_deref()
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn payload(&self) -> &CanonicalValue {
        &self.payload
    }

    pub fn prev_hash(&self) -> &str {
        &self.prev_hash
    }

    pub fn event_hash(&self) -> &str {
        &self.event_hash
    }

    /// The value tree that is canonicalized and hashed for this event.
    ///
    /// `prev_hash` and `event_hash` are excluded: they are computed from
    /// the rest, not part of it.
    pub fn canonical_value(&self) -> CanonicalValue {
        body_value(BodyRef {
            event_id: &self.event_id,
            actor_principal_id: &self.actor_principal_id,
            action: &self.action,
            tier: self.tier,
            case_id: self.case_id.as_deref(),
            created_at: &self.created_at,
            payload: &self.payload,
        })
    }

    /// Render this event as one JSON Lines record (no trailing newline).
    pub fn to_json_line(&self) -> ChainproofResult<String> {
        serde_json::to_string(self).map_err(|e| ChainproofError::Serialization {
            reason: format!("audit event {} is not serializable: {e}", self.event_id),
        })
    }
}

struct BodyRef<'a> {
    event_id: &'a str,
    actor_principal_id: &'a str,
    action: &'a str,
    tier: Tier,
    case_id: Option<&'a str>,
    created_at: &'a str,
    payload: &'a CanonicalValue,
}

fn body_value(body: BodyRef<'_>) -> CanonicalValue {
    let mut map = BTreeMap::new();
    map.insert("action".to_string(), body.action.into());
    map.insert(
        "actor_principal_id".to_string(),
        body.actor_principal_id.into(),
    );
    map.insert("case_id".to_string(), body.case_id.into());
    map.insert("created_at".to_string(), body.created_at.into());
    map.insert("event_id".to_string(), body.event_id.into());
    map.insert("payload".to_string(), body.payload.clone());
    map.insert("tier".to_string(), body.tier.as_str().into());
    CanonicalValue::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(payload: CanonicalValue) -> EventFields {
        EventFields {
            event_id: "evt-1".to_string(),
            actor_principal_id: "actor-1".to_string(),
            action: "case.create".to_string(),
            tier: Tier::Green,
            case_id: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            payload,
        }
    }

    #[test]
    fn seal_rejects_non_object_payloads() {
        for payload in [
            CanonicalValue::from(5),
            CanonicalValue::Null,
            CanonicalValue::from("text"),
            CanonicalValue::Array(Vec::new()),
        ] {
            let kind = payload.kind();
            let err = AuditEvent::seal(fields(payload), GENESIS_HASH).unwrap_err();
            match err {
                ChainproofError::Serialization { reason } => {
                    assert!(reason.contains(kind), "reason should name {kind}, got: {reason}")
                }
                other => panic!("expected Serialization, got {:?}", other),
            }
        }
    }

    #[test]
    fn seal_accepts_empty_object_payload() {
        let event = AuditEvent::seal(fields(CanonicalValue::Object(BTreeMap::new())), GENESIS_HASH)
            .unwrap();
        assert_eq!(event.prev_hash(), GENESIS_HASH);
        assert_eq!(event.event_hash().len(), 64);
    }
}
