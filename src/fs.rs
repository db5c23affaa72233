//! Disk-backed cache storage.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::store::{CacheStorage, CachedResponse};

/// Persistent cache storage rooted at a directory.
///
/// Each bucket is a subdirectory and each entry a JSON file named by the
/// SHA-256 of its key, so arbitrary method + URL keys never reach the
/// filesystem verbatim. Bucket names become directory names and must be
/// valid path components.
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn entry_path(&self, bucket: &str, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.bucket_dir(bucket).join(format!("{digest}.json"))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open_bucket(&self, name: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.bucket_dir(name)).await?;
        Ok(())
    }

    async fn bucket_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_bucket(&self, name: &str) -> Result<bool> {
        match tokio::fs::remove_dir_all(self.bucket_dir(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>> {
        match tokio::fs::read(self.entry_path(bucket, key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, bucket: &str, key: &str, entry: CachedResponse) -> Result<()> {
        tokio::fs::create_dir_all(self.bucket_dir(bucket)).await?;
        let path = self.entry_path(bucket, key);
        // Write to a .part file, then rename into place.
        let part = path.with_extension("json.part");
        tokio::fs::write(&part, serde_json::to_vec(&entry)?).await?;
        tokio::fs::rename(&part, &path).await?;
        Ok(())
    }
}
