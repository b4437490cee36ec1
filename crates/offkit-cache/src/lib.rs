//! # OffKit Cache
//!
//! Generation-named cache stores for the OffKit offline cache manager.
//!
//! A [`CacheStorage`] holds any number of named [`CacheStore`]s. Each store
//! belongs to one deployment generation and maps request identity (method +
//! URL) to a stored response. Exactly one store is expected to survive
//! activation; the rest are garbage from prior deployments.
//!
//! ## Architecture
//!
//! ```text
//! CacheStorage
//!     └── CacheStore ("afm-finance-v1")
//!             └── CacheKey (GET https://…) → CacheEntry
//! ```
//!
//! The types here are plain data structures. Callers that share a storage
//! across concurrent tasks wrap it in `Arc<tokio::sync::RwLock<_>>`; the lock
//! serializes concurrent writes.

use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, Method, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Cache storage errors.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("Cache store not found: {0}")]
    StoreNotFound(String),

    #[error("Invalid cache name: {0}")]
    InvalidName(String),
}

/// Request identity used as the cache key: method plus full URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: Method,
    pub url: Url,
}

impl CacheKey {
    /// Key for a GET request to the given URL.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
        }
    }

    /// Key for an arbitrary method.
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }
}

/// A cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Response status.
    pub status: StatusCode,

    /// Response headers.
    pub headers: HeaderMap,

    /// Response body.
    pub body: Bytes,

    /// When the entry was stored (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            cached_at: now_ms(),
        }
    }
}

/// One generation's cache store.
#[derive(Debug, Default)]
pub struct CacheStore {
    name: String,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl CacheStore {
    /// Create an empty store with the given generation name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Generation name of this store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry by request identity.
    pub fn match_key(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Check whether an entry exists.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store an entry, replacing any previous one for the same key.
    pub fn put(&mut self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// Commit a staged batch of entries in one step.
    ///
    /// This is the bulk-store primitive behind precaching: callers stage the
    /// whole batch first (failing early if any resource could not be
    /// fetched), then commit. A commit never leaves the store partially
    /// updated with respect to the batch.
    pub fn put_all(&mut self, batch: Vec<(CacheKey, CacheEntry)>) {
        let count = batch.len();
        for (key, entry) in batch {
            self.entries.insert(key, entry);
        }
        debug!(store = %self.name, count, "Committed cache batch");
    }

    /// Delete an entry. Returns true if it existed.
    pub fn delete(&mut self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// All keys currently in the store.
    pub fn keys(&self) -> Vec<&CacheKey> {
        self.entries.keys().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry of named cache stores.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, CacheStore>,
}

impl CacheStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store, creating it if absent.
    pub fn open(&mut self, name: &str) -> &mut CacheStore {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| CacheStore::new(name))
    }

    /// Check if a store exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Get a store without creating it.
    pub fn get(&self, name: &str) -> Option<&CacheStore> {
        self.caches.get(name)
    }

    /// Get a store mutably without creating it.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut CacheStore> {
        self.caches.get_mut(name)
    }

    /// Get a store or fail.
    pub fn store(&self, name: &str) -> Result<&CacheStore, CacheError> {
        self.caches
            .get(name)
            .ok_or_else(|| CacheError::StoreNotFound(name.to_string()))
    }

    /// Delete a store. Returns true if it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Names of all stores.
    pub fn names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    /// Delete every store except the named one, returning the deleted names.
    ///
    /// This is the activation-time garbage collection step: after it runs,
    /// at most one store (the current generation's) remains.
    pub fn retain_only(&mut self, keep: &str) -> Vec<String> {
        let stale: Vec<String> = self
            .caches
            .keys()
            .filter(|name| name.as_str() != keep)
            .cloned()
            .collect();
        for name in &stale {
            self.caches.remove(name);
            debug!(store = %name, "Deleted stale cache store");
        }
        stale
    }

    /// Look up an entry in a specific store.
    pub fn match_in(&self, name: &str, key: &CacheKey) -> Option<&CacheEntry> {
        self.caches.get(name).and_then(|c| c.match_key(key))
    }
}

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
