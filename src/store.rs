//! Cache bucket storage abstraction and the in-memory backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::FetchResponse;

/// A response captured into a cache bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// The captured response.
    pub response: FetchResponse,
    /// When the response was stored.
    pub stored_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Captures a response, stamping it with the current time.
    #[must_use]
    pub fn new(response: FetchResponse) -> Self {
        Self {
            response,
            stored_at: Utc::now(),
        }
    }
}

/// Abstraction over the host's named-bucket cache storage.
///
/// One bucket exists per cache generation; keys are request identities
/// (method + URL). `put` overwrites an existing key, so handlers racing to
/// populate the same key resolve last-write-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Opens a bucket, creating it if absent.
    async fn open_bucket(&self, name: &str) -> Result<()>;

    /// Lists existing bucket names in sorted order.
    async fn bucket_names(&self) -> Result<Vec<String>>;

    /// Deletes a bucket and all its entries. Returns whether it existed.
    async fn delete_bucket(&self, name: &str) -> Result<bool>;

    /// Looks up an entry by exact key.
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>>;

    /// Stores an entry, creating the bucket if absent.
    async fn put(&self, bucket: &str, key: &str, entry: CachedResponse) -> Result<()>;
}

type BucketMap = HashMap<String, HashMap<String, CachedResponse>>;

/// In-process cache storage backed by a shared map.
///
/// `Clone` shares the underlying store, so successive worker registrations
/// in tests observe the same buckets.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    buckets: Arc<Mutex<BucketMap>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in a bucket, if it exists.
    #[must_use]
    pub fn entry_count(&self, bucket: &str) -> Option<usize> {
        self.buckets.lock().unwrap().get(bucket).map(HashMap::len)
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open_bucket(&self, name: &str) -> Result<()> {
        self.buckets.lock().unwrap().entry(name.to_string()).or_default();
        Ok(())
    }

    async fn bucket_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.buckets.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_bucket(&self, name: &str) -> Result<bool> {
        Ok(self.buckets.lock().unwrap().remove(name).is_some())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>> {
        Ok(self
            .buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn put(&self, bucket: &str, key: &str, entry: CachedResponse) -> Result<()> {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }
}
