//! Object-store capability for stage spill and final outputs.
//!
//! The pipeline only needs a small key/value surface; production deploys
//! back it with a bucket, tests and the CLI with a directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ParseError, Result};

/// Minimal object-store surface used by the pipeline.
pub trait ObjectStore {
    /// Store raw bytes under `key`.
    fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Store a local file's contents under `key`.
    fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        let bytes = fs::read(path).map_err(|e| ParseError::Storage(e.to_string()))?;
        self.put_bytes(key, &bytes)
    }

    /// Fetch the object at `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Whether an object exists at `key`.
    fn exists(&self, key: &str) -> Result<bool>;
}

/// Filesystem-backed object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ParseError::Storage(e.to_string()))?;
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for FsObjectStore {
    fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ParseError::Storage(e.to_string()))?;
        }
        fs::write(&path, bytes).map_err(|e| ParseError::Storage(e.to_string()))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        fs::read(self.resolve(key)).map_err(|e| ParseError::Storage(e.to_string()))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.resolve(key).exists())
    }
}

/// Key of one stage's spilled stream: `<prefix>/<user?>/<job>/<stage>.jsonl`.
pub fn stage_key(prefix: &str, user_id: Option<&str>, job_id: &str, stage: &str) -> String {
    match user_id {
        Some(user) => format!("{prefix}/{user}/{job_id}/{stage}.jsonl"),
        None => format!("{prefix}/{job_id}/{stage}.jsonl"),
    }
}

/// Key of a final output: the source key with its `pdf` extension replaced.
///
/// Returns `None` when the source key does not name a PDF.
pub fn result_key(source_key: &str, ext: &str) -> Option<String> {
    let stem = source_key.strip_suffix(".pdf")?;
    Some(format!("{stem}.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path()).unwrap();

        store.put_bytes("a/b/c.jsonl", b"hello").unwrap();
        assert!(store.exists("a/b/c.jsonl").unwrap());
        assert!(!store.exists("a/b/missing.jsonl").unwrap());
        assert_eq!(store.get("a/b/c.jsonl").unwrap(), b"hello");
    }

    #[test]
    fn put_file_copies_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("bucket")).unwrap();
        let local = dir.path().join("local.jsonl");
        std::fs::write(&local, "{}\n").unwrap();

        store.put_file("jobs/1/rows.jsonl", &local).unwrap();
        assert_eq!(store.get("jobs/1/rows.jsonl").unwrap(), b"{}\n");
    }

    #[test]
    fn stage_key_layout() {
        assert_eq!(
            stage_key("bank-statements-auth", Some("u1"), "j1", "clean_data"),
            "bank-statements-auth/u1/j1/clean_data.jsonl"
        );
        assert_eq!(
            stage_key("bank-statements", None, "j1", "build_rows"),
            "bank-statements/j1/build_rows.jsonl"
        );
    }

    #[test]
    fn result_key_swaps_extension() {
        assert_eq!(
            result_key("bank-statements/abc/statement.pdf", "csv").as_deref(),
            Some("bank-statements/abc/statement.csv")
        );
        assert_eq!(result_key("bank-statements/abc/statement.txt", "csv"), None);
    }
}
