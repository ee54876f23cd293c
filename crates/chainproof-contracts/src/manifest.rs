//! Export manifest types.
//!
//! An `ExportManifest` is written once when a bundle is exported and never
//! changed afterwards.  It commits to the audit log twice (raw file digest
//! and chain head) and to every bundled document by digest.

use serde::{Deserialize, Serialize};

/// Snapshot of one export operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub case_id: String,
    pub case_type: String,
    /// RFC 3339 timestamp of the export.
    pub exported_at: String,
    /// `event_hash` of the last exported event, or the genesis hash when
    /// the log is empty.
    pub audit_head_hash: String,
    /// SHA-256 (hex) of the raw `audit.jsonl` bytes.
    pub audit_events_sha256: String,
    pub documents: Vec<DocumentEntry>,
}

/// One bundled document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub slot_name: String,
    pub document_id: String,
    pub document_type: String,
    pub title: String,
    /// SHA-256 (hex) of the bundled file's bytes.
    pub sha256: String,
    /// Location of the file relative to the bundle root.
    pub bundle_path: String,
}
