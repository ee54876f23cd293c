//! # chainproof-contracts
//!
//! Shared types, the payload value tree, and error contracts for the
//! chainproof audit chain.
//!
//! All crates in the workspace import from here. No hashing or I/O lives in
//! this crate, only data definitions and error types.

pub mod error;
pub mod manifest;
pub mod outcome;
pub mod tier;
pub mod value;

pub use error::{ChainproofError, ChainproofResult};
pub use manifest::{DocumentEntry, ExportManifest};
pub use outcome::{BundleReport, ChainOutcome};
pub use tier::Tier;
pub use value::CanonicalValue;
