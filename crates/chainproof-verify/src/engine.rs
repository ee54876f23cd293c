//! Fail-closed evidence bundle verifier.
//!
//! `BundleVerifier` checks a bundle against its manifest.  Checks run in
//! order and every failure is collected into the `BundleReport` before
//! returning, so an investigator sees the full set of mismatches in one
//! pass:
//!
//! 1. **Head**: when the caller pinned a head hash out of band, the
//!    manifest must carry that same head.
//! 2. **Audit log**: one streaming pass replays the chain against
//!    `audit_head_hash` and digests the raw bytes for `audit_events_sha256`.
//! 3. **Documents**: every manifest entry is re-hashed from the source.
//! 4. **Checksum listing**: in `verify_dir`, when the bundle carries a
//!    `checksums.txt`, every listed file is re-hashed.
//!
//! The bundle is accepted only when no check failed.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use tracing::{info, warn};

use chainproof_contracts::{BundleReport, ChainproofError, ExportManifest};
use chainproof_core::{verify_jsonl, CancelToken, DocumentSource};

use crate::checksums::parse_listing;
use crate::digest::{sha256_reader, HashingReader};
use crate::manifest::parse_manifest;
use crate::source::DirectoryBundle;

/// File names inside a bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    pub manifest_name: String,
    pub audit_log_name: String,
    pub checksums_name: String,
}

impl Default for BundleLayout {
    fn default() -> Self {
        Self {
            manifest_name: "manifest.json".to_string(),
            audit_log_name: "audit.jsonl".to_string(),
            checksums_name: "checksums.txt".to_string(),
        }
    }
}

/// Verify one bundle with default settings.
pub fn verify_bundle<R: Read>(
    log: R,
    manifest: &ExportManifest,
    documents: &dyn DocumentSource,
) -> BundleReport {
    BundleVerifier::new().verify(log, manifest, documents)
}

/// The bundle verifier.
#[derive(Debug, Clone, Default)]
pub struct BundleVerifier {
    layout: BundleLayout,
    cancel: CancelToken,
    expected_head: Option<String>,
}

impl BundleVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: BundleLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Abort verification when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Require the manifest to carry `head`, obtained from a trusted source.
    pub fn with_expected_head(mut self, head: impl Into<String>) -> Self {
        self.expected_head = Some(head.into());
        self
    }

    pub fn layout(&self) -> &BundleLayout {
        &self.layout
    }

    /// Verify a log stream and documents against an already parsed manifest.
    pub fn verify<R: Read>(
        &self,
        log: R,
        manifest: &ExportManifest,
        documents: &dyn DocumentSource,
    ) -> BundleReport {
        let mut report = BundleReport::default();
        self.check_head(&mut report, manifest);
        if self.check_log(&mut report, log, manifest) {
            self.check_documents(&mut report, manifest, documents);
        }
        finish(&manifest.case_id, report)
    }

    /// Verify an unpacked bundle directory.
    pub fn verify_dir(&self, dir: &Path) -> BundleReport {
        let mut report = BundleReport::default();

        let manifest_path = dir.join(&self.layout.manifest_name);
        let manifest = match fs::read(&manifest_path)
            .map_err(|e| unreadable(&self.layout.manifest_name, e))
            .and_then(|bytes| parse_manifest(&bytes))
        {
            Ok(manifest) => manifest,
            Err(e) => {
                report.reject(e);
                return finish("<unknown>", report);
            }
        };

        self.check_head(&mut report, &manifest);

        let completed = match File::open(dir.join(&self.layout.audit_log_name)) {
            Ok(log) => self.check_log(&mut report, log, &manifest),
            Err(e) => {
                report.reject(unreadable(&self.layout.audit_log_name, e));
                true
            }
        };
        if !completed {
            return finish(&manifest.case_id, report);
        }

        let bundle = DirectoryBundle::new(dir);
        if self.check_documents(&mut report, &manifest, &bundle) {
            self.check_listing(&mut report, &bundle);
        }
        finish(&manifest.case_id, report)
    }

    // ── Individual checks ─────────────────────────────────────────────────────

    fn check_head(&self, report: &mut BundleReport, manifest: &ExportManifest) {
        if let Some(expected) = &self.expected_head {
            if *expected != manifest.audit_head_hash {
                report.reject(ChainproofError::HeadMismatch {
                    expected: expected.clone(),
                    computed: manifest.audit_head_hash.clone(),
                });
            }
        }
    }

    /// Replay and digest the log.  Returns false when cancelled.
    fn check_log<R: Read>(
        &self,
        report: &mut BundleReport,
        log: R,
        manifest: &ExportManifest,
    ) -> bool {
        let mut hashing = HashingReader::new(log);
        let chain = verify_jsonl(
            BufReader::new(&mut hashing),
            Some(manifest.audit_head_hash.as_str()),
            &self.cancel,
        );
        match chain {
            Ok(outcome) => report.chain = Some(outcome),
            Err(e @ ChainproofError::Cancelled { .. }) => {
                report.reject(e);
                return false;
            }
            Err(e) => report.reject(e),
        }

        match hashing.finish() {
            Ok(actual) => {
                if actual != manifest.audit_events_sha256 {
                    report.reject(ChainproofError::ChecksumMismatch {
                        path: self.layout.audit_log_name.clone(),
                        slot_name: None,
                        expected: manifest.audit_events_sha256.clone(),
                        actual: actual.clone(),
                    });
                }
                report.audit_events_sha256 = Some(actual);
            }
            Err(e) => report.reject(unreadable(&self.layout.audit_log_name, e)),
        }
        true
    }

    /// Hash every manifest document.  Returns false when cancelled.
    fn check_documents(
        &self,
        report: &mut BundleReport,
        manifest: &ExportManifest,
        documents: &dyn DocumentSource,
    ) -> bool {
        for (position, doc) in manifest.documents.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.reject(ChainproofError::Cancelled { position });
                return false;
            }
            let actual = match documents.open(&doc.bundle_path).and_then(|reader| {
                sha256_reader(reader).map_err(|e| unreadable(&doc.bundle_path, e))
            }) {
                Ok(actual) => actual,
                Err(e) => {
                    report.reject(e);
                    continue;
                }
            };
            report.documents_checked += 1;
            if actual != doc.sha256 {
                report.reject(ChainproofError::ChecksumMismatch {
                    path: doc.bundle_path.clone(),
                    slot_name: Some(doc.slot_name.clone()),
                    expected: doc.sha256.clone(),
                    actual,
                });
            }
        }
        true
    }

    fn check_listing(&self, report: &mut BundleReport, bundle: &DirectoryBundle) {
        let listing_path = bundle.root().join(&self.layout.checksums_name);
        let text = match fs::read_to_string(&listing_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) => {
                report.reject(unreadable(&self.layout.checksums_name, e));
                return;
            }
        };
        let entries = match parse_listing(&text) {
            Ok(entries) => entries,
            Err(e) => {
                report.reject(e);
                return;
            }
        };

        for entry in entries {
            if entry.path == self.layout.checksums_name {
                continue;
            }
            let actual = match bundle.open(&entry.path).and_then(|reader| {
                sha256_reader(reader).map_err(|e| unreadable(&entry.path, e))
            }) {
                Ok(actual) => actual,
                Err(e) => {
                    report.reject(e);
                    continue;
                }
            };
            if actual != entry.sha256 {
                report.reject(ChainproofError::ChecksumMismatch {
                    path: entry.path,
                    slot_name: None,
                    expected: entry.sha256,
                    actual,
                });
            }
        }
    }
}

fn unreadable(path: &str, e: io::Error) -> ChainproofError {
    ChainproofError::DocumentUnreadable {
        path: path.to_string(),
        reason: e.to_string(),
    }
}

fn finish(case_id: &str, report: BundleReport) -> BundleReport {
    if report.accepted() {
        info!(
            case_id,
            documents = report.documents_checked,
            events = report.chain.as_ref().map_or(0, |c| c.event_count()),
            "bundle verified"
        );
    } else {
        for error in &report.rejections {
            warn!(case_id, %error, "bundle check failed");
        }
        warn!(case_id, rejections = report.rejections.len(), "bundle rejected");
    }
    report
}
