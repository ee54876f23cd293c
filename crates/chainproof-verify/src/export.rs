//! Evidence bundle export.
//!
//! Writes the layout `BundleVerifier::verify_dir` reads back: the audit
//! log, one file per document under `documents/`, the manifest committing
//! to all of them, and a `sha256sum`-compatible checksum listing.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path};

use chrono::{SecondsFormat, Utc};
use tracing::info;

use chainproof_contracts::{ChainproofError, ChainproofResult, DocumentEntry, ExportManifest};
use chainproof_core::{sha256_hex, verify_chain, AuditEvent, GENESIS_HASH};

use crate::checksums::{render_listing, ChecksumEntry};
use crate::engine::BundleLayout;

const DOCUMENTS_DIR: &str = "documents";

/// One document to place in a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub slot_name: String,
    pub document_id: String,
    pub document_type: String,
    pub title: String,
    pub bytes: Vec<u8>,
}

/// Everything that goes into one case export.
#[derive(Debug, Clone)]
pub struct BundleExport<'a> {
    pub case_id: String,
    pub case_type: String,
    /// The audit events to include, in chain order.
    pub events: &'a [AuditEvent],
    pub documents: Vec<ExportDocument>,
}

/// Write `export` into `dir` using the default file names.
pub fn export_bundle(export: &BundleExport<'_>, dir: &Path) -> ChainproofResult<ExportManifest> {
    export.write_to(dir, &BundleLayout::default())
}

impl BundleExport<'_> {
    /// Write the bundle and return the manifest that was written.
    ///
    /// The events must form a valid chain; a broken chain is never
    /// exported.
    pub fn write_to(&self, dir: &Path, layout: &BundleLayout) -> ChainproofResult<ExportManifest> {
        let outcome = verify_chain(self.events, None)?;
        let head = outcome.head_hash().unwrap_or(GENESIS_HASH).to_string();

        let mut documents: Vec<&ExportDocument> = self.documents.iter().collect();
        documents.sort_by(|a, b| a.slot_name.cmp(&b.slot_name));
        check_documents(&documents)?;

        fs::create_dir_all(dir.join(DOCUMENTS_DIR))?;
        let mut listing = Vec::with_capacity(documents.len() + 2);

        let mut log = String::new();
        for event in self.events {
            log.push_str(&event.to_json_line()?);
            log.push('\n');
        }
        let audit_events_sha256 = sha256_hex(log.as_bytes());
        fs::write(dir.join(&layout.audit_log_name), log.as_bytes())?;
        listing.push(ChecksumEntry::new(
            audit_events_sha256.clone(),
            layout.audit_log_name.clone(),
        ));

        let mut entries = Vec::with_capacity(documents.len());
        for doc in documents {
            let bundle_path = format!("{DOCUMENTS_DIR}/{}", doc.document_id);
            let sha256 = sha256_hex(&doc.bytes);
            fs::write(dir.join(&bundle_path), &doc.bytes)?;
            listing.push(ChecksumEntry::new(sha256.clone(), bundle_path.clone()));
            entries.push(DocumentEntry {
                slot_name: doc.slot_name.clone(),
                document_id: doc.document_id.clone(),
                document_type: doc.document_type.clone(),
                title: doc.title.clone(),
                sha256,
                bundle_path,
            });
        }

        let manifest = ExportManifest {
            case_id: self.case_id.clone(),
            case_type: self.case_type.clone(),
            exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            audit_head_hash: head,
            audit_events_sha256,
            documents: entries,
        };
        let manifest_bytes =
            serde_json::to_vec_pretty(&manifest).map_err(|e| ChainproofError::Serialization {
                reason: e.to_string(),
            })?;
        fs::write(dir.join(&layout.manifest_name), &manifest_bytes)?;
        listing.push(ChecksumEntry::new(
            sha256_hex(&manifest_bytes),
            layout.manifest_name.clone(),
        ));

        fs::write(dir.join(&layout.checksums_name), render_listing(&listing))?;

        info!(
            case_id = %manifest.case_id,
            events = outcome.event_count(),
            documents = manifest.documents.len(),
            head = %manifest.audit_head_hash,
            "bundle exported"
        );
        Ok(manifest)
    }
}

/// Slot names and document ids must be unique, and each id must be a single
/// plain file name.
fn check_documents(documents: &[&ExportDocument]) -> ChainproofResult<()> {
    let mut slots = HashSet::new();
    let mut ids = HashSet::new();
    for doc in documents {
        if !slots.insert(doc.slot_name.as_str()) {
            return Err(ChainproofError::ManifestMalformed {
                reason: format!("duplicate slot_name '{}'", doc.slot_name),
            });
        }
        if !ids.insert(doc.document_id.as_str()) {
            return Err(ChainproofError::ManifestMalformed {
                reason: format!("duplicate document_id '{}'", doc.document_id),
            });
        }
        let mut components = Path::new(&doc.document_id).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !doc.document_id.contains(['/', '\\']);
        if !plain {
            return Err(ChainproofError::ManifestMalformed {
                reason: format!("document_id '{}' is not a plain file name", doc.document_id),
            });
        }
    }
    Ok(())
}
