//! Plain-text checksum listing (`checksums.txt`).
//!
//! One line per bundle file: `<sha256 hex>  <relative path>`, the format
//! `sha256sum -c` reads.  Parsing also accepts a single space and the
//! `*` binary-mode marker that `sha256sum -b` emits.

use chainproof_contracts::{ChainproofError, ChainproofResult};

/// One line of a checksum listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    pub sha256: String,
    pub path: String,
}

impl ChecksumEntry {
    pub fn new(sha256: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            sha256: sha256.into(),
            path: path.into(),
        }
    }
}

/// Render entries sorted by path, one per line, with a trailing newline.
pub fn render_listing(entries: &[ChecksumEntry]) -> String {
    let mut sorted: Vec<&ChecksumEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));
    sorted
        .iter()
        .map(|entry| format!("{}  {}\n", entry.sha256, entry.path))
        .collect()
}

/// Parse a listing.  Blank lines are skipped; digests are normalized to
/// lowercase.
pub fn parse_listing(text: &str) -> ChainproofResult<Vec<ChecksumEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let malformed = |what: &str| ChainproofError::ManifestMalformed {
            reason: format!("checksum listing line {}: {what}", idx + 1),
        };

        let (digest, rest) = line
            .split_once(' ')
            .ok_or_else(|| malformed("expected '<sha256>  <path>'"))?;
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(malformed("digest is not 64 hex characters"));
        }
        let path = rest.trim_start_matches(' ');
        let path = path.strip_prefix('*').unwrap_or(path);
        if path.is_empty() {
            return Err(malformed("missing path"));
        }
        entries.push(ChecksumEntry::new(digest.to_ascii_lowercase(), path));
    }
    Ok(entries)
}
