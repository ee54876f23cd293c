//! Manifest parsing with structural validation.
//!
//! Parsing runs in two phases:
//!
//! 1. **Structural**: the raw JSON is validated against a JSON Schema
//!    document using the `jsonschema` crate, so every missing field or
//!    malformed digest is reported in one pass.
//! 2. **Typed**: the validated value is deserialized into
//!    `ExportManifest`, and cross-entry rules (unique slot names) are
//!    checked.
//!
//! Any failure is `ManifestMalformed`.

use std::collections::HashSet;

use serde_json::{json, Value};
use tracing::warn;

use chainproof_contracts::{ChainproofError, ChainproofResult, ExportManifest};
use chainproof_core::from_canonical_slice;

/// The JSON Schema every manifest must satisfy.
pub fn manifest_schema() -> Value {
    let hex64 = json!({ "type": "string", "pattern": "^[0-9a-f]{64}$" });
    json!({
        "type": "object",
        "required": [
            "case_id",
            "case_type",
            "exported_at",
            "audit_head_hash",
            "audit_events_sha256",
            "documents"
        ],
        "properties": {
            "case_id": { "type": "string" },
            "case_type": { "type": "string" },
            "exported_at": { "type": "string" },
            "audit_head_hash": hex64,
            "audit_events_sha256": hex64,
            "documents": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": [
                        "slot_name",
                        "document_id",
                        "document_type",
                        "title",
                        "sha256",
                        "bundle_path"
                    ],
                    "properties": {
                        "slot_name": { "type": "string", "minLength": 1 },
                        "document_id": { "type": "string", "minLength": 1 },
                        "document_type": { "type": "string" },
                        "title": { "type": "string" },
                        "sha256": hex64,
                        "bundle_path": { "type": "string", "minLength": 1 }
                    }
                }
            }
        }
    })
}

/// Parse and validate manifest bytes.
pub fn parse_manifest(bytes: &[u8]) -> ChainproofResult<ExportManifest> {
    // Parse through the duplicate-rejecting value tree first: a plain
    // `serde_json::Value` keeps only the last of two equal keys.
    let tree = from_canonical_slice(bytes).map_err(|e| ChainproofError::ManifestMalformed {
        reason: format!("invalid manifest JSON: {e}"),
    })?;
    let raw = Value::from(tree);

    // ── Phase 1: JSON Schema structural validation ────────────────────────
    let schema = manifest_schema();
    let validator =
        jsonschema::validator_for(&schema).map_err(|e| ChainproofError::ManifestMalformed {
            reason: format!("invalid manifest schema document: {e}"),
        })?;
    let violations: Vec<String> = validator
        .iter_errors(&raw)
        .map(|error| format!("at {}: {}", error.instance_path, error))
        .collect();
    if !violations.is_empty() {
        let reason = violations.join("; ");
        warn!(%reason, "manifest failed structural validation");
        return Err(ChainproofError::ManifestMalformed { reason });
    }

    // ── Phase 2: typed deserialization and cross-entry rules ─────────────
    let manifest: ExportManifest =
        serde_json::from_value(raw).map_err(|e| ChainproofError::ManifestMalformed {
            reason: e.to_string(),
        })?;

    let mut slots = HashSet::new();
    for doc in &manifest.documents {
        if !slots.insert(doc.slot_name.as_str()) {
            return Err(ChainproofError::ManifestMalformed {
                reason: format!("duplicate slot_name '{}'", doc.slot_name),
            });
        }
    }

    Ok(manifest)
}
