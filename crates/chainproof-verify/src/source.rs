//! `DocumentSource` implementations.
//!
//! `DirectoryBundle` reads files from an unpacked bundle directory and
//! refuses any `bundle_path` that could escape it.  `MemoryDocuments` holds
//! bytes in a map and is used when a bundle has already been loaded.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use chainproof_contracts::{ChainproofError, ChainproofResult};
use chainproof_core::DocumentSource;

/// Check that `bundle_path` is a relative path that stays inside the
/// bundle root.
pub fn check_bundle_path(bundle_path: &str) -> ChainproofResult<()> {
    let unsafe_path = |why: &str| ChainproofError::ManifestMalformed {
        reason: format!("bundle_path '{bundle_path}' {why}"),
    };

    if bundle_path.is_empty() {
        return Err(unsafe_path("is empty"));
    }
    if bundle_path.starts_with('/') || bundle_path.starts_with('\\') {
        return Err(unsafe_path("is absolute"));
    }
    for component in Path::new(bundle_path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(unsafe_path("leaves the bundle root")),
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_path("is absolute")),
        }
    }
    Ok(())
}

// ── DirectoryBundle ───────────────────────────────────────────────────────────

/// Documents stored under an unpacked bundle directory.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a bundle-relative path to a filesystem path under the root.
    pub fn resolve(&self, bundle_path: &str) -> ChainproofResult<PathBuf> {
        check_bundle_path(bundle_path)?;
        Ok(self.root.join(bundle_path))
    }
}

impl DocumentSource for DirectoryBundle {
    fn open(&self, bundle_path: &str) -> ChainproofResult<Box<dyn Read + '_>> {
        let path = self.resolve(bundle_path)?;
        let file = File::open(&path).map_err(|e| ChainproofError::DocumentUnreadable {
            path: bundle_path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

// ── MemoryDocuments ───────────────────────────────────────────────────────────

/// Bundle files held in memory, keyed by bundle path.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocuments {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the bytes stored at `bundle_path`.
    pub fn insert(&mut self, bundle_path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(bundle_path.into(), bytes.into());
    }

    pub fn with(mut self, bundle_path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(bundle_path, bytes);
        self
    }
}

impl DocumentSource for MemoryDocuments {
    fn open(&self, bundle_path: &str) -> ChainproofResult<Box<dyn Read + '_>> {
        check_bundle_path(bundle_path)?;
        self.files
            .get(bundle_path)
            .map(|bytes| Box::new(bytes.as_slice()) as Box<dyn Read + '_>)
            .ok_or_else(|| ChainproofError::DocumentUnreadable {
                path: bundle_path.to_string(),
                reason: "no such file in bundle".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_are_accepted() {
        assert!(check_bundle_path("documents/doc-1").is_ok());
        assert!(check_bundle_path("./documents/doc-1").is_ok());
    }

    #[test]
    fn escaping_paths_are_malformed() {
        for path in ["", "/etc/passwd", "../secret", "documents/../../x"] {
            let err = check_bundle_path(path).unwrap_err();
            assert!(
                matches!(err, ChainproofError::ManifestMalformed { .. }),
                "{path:?} should be rejected, got {:?}",
                err
            );
        }
    }

    #[test]
    fn directory_bundle_reports_missing_file_as_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = DirectoryBundle::new(dir.path());
        let err = bundle.open("documents/missing").err().unwrap();
        match err {
            ChainproofError::DocumentUnreadable { path, .. } => assert_eq!(path, "documents/missing"),
            other => panic!("expected DocumentUnreadable, got {:?}", other),
        }
    }

    #[test]
    fn directory_bundle_reads_file_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("documents")).unwrap();
        std::fs::write(dir.path().join("documents/doc-1"), b"hello").unwrap();

        let bundle = DirectoryBundle::new(dir.path());
        let mut bytes = Vec::new();
        bundle.open("documents/doc-1").unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn memory_documents_serve_inserted_bytes() {
        let docs = MemoryDocuments::new().with("documents/a", b"abc".to_vec());
        let mut bytes = Vec::new();
        docs.open("documents/a").unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"abc");
        assert!(docs.open("documents/b").is_err());
    }
}
