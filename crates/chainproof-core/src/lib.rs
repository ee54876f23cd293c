//! # chainproof-core
//!
//! The deterministic kernel of the chainproof audit chain.
//!
//! This crate provides:
//! - The canonical serializer that turns a `CanonicalValue` into the exact
//!   bytes that get hashed
//! - `AuditEvent`, the sealed hash-linked record
//! - `ChainVerifier` and the `verify_chain` / `verify_jsonl` helpers
//! - The `AuditStore` and `DocumentSource` traits at the byte boundary
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chainproof_core::{verify_jsonl, CancelToken};
//!
//! let file = std::io::BufReader::new(std::fs::File::open("audit.jsonl")?);
//! let outcome = verify_jsonl(file, Some(expected_head), &CancelToken::new())?;
//! ```

pub mod cancel;
pub mod canonical;
pub mod chain;
pub mod event;
pub mod traits;

pub use cancel::CancelToken;
pub use canonical::{from_canonical_slice, to_canonical_bytes, to_canonical_string};
pub use chain::{hash_event, sha256_hex, verify_chain, verify_jsonl, ChainVerifier, JsonlEvents};
pub use event::{AuditEvent, EventFields, GENESIS_HASH};
pub use traits::{AuditStore, DocumentSource};
