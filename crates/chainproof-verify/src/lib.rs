//! # chainproof-verify
//!
//! Evidence bundle export and verification for the chainproof audit chain.
//!
//! A bundle is a directory holding `manifest.json`, `audit.jsonl`,
//! `checksums.txt` and `documents/<document_id>`.  This crate provides:
//!
//! - [`export::BundleExport`], which writes that layout and computes every
//!   digest
//! - [`manifest::parse_manifest`], JSON Schema validation followed by typed
//!   deserialization
//! - [`engine::BundleVerifier`], the fail-closed verifier that collects
//!   every mismatch into a `BundleReport`
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use chainproof_verify::BundleVerifier;
//!
//! let report = BundleVerifier::new()
//!     .with_expected_head(trusted_head)
//!     .verify_dir(Path::new("export-case-42"));
//! if !report.accepted() {
//!     for rejection in &report.rejections {
//!         eprintln!("{rejection}");
//!     }
//! }
//! ```

pub mod checksums;
pub mod digest;
pub mod engine;
pub mod export;
pub mod manifest;
pub mod source;

pub use checksums::{parse_listing, render_listing, ChecksumEntry};
pub use digest::{sha256_reader, HashingReader};
pub use engine::{verify_bundle, BundleLayout, BundleVerifier};
pub use export::{export_bundle, BundleExport, ExportDocument};
pub use manifest::{manifest_schema, parse_manifest};
pub use source::{check_bundle_path, DirectoryBundle, MemoryDocuments};

// ── Tests ─────────────────────────────────────────────────────────────────────
