//! Read-through list cache.
//!
//! Backed by `moka`, with a TTL carried by each entry so that one cache
//! can hold lists with different lifetimes. Writes invalidate explicitly
//! through [`Cache::forget`]; the cache is process-local, so other
//! instances may serve stale data for at most the entry's TTL.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache as MokaCache;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

const DEFAULT_CAPACITY: u64 = 1_024;

#[derive(Clone)]
struct Entry {
    value: Arc<Value>,
    ttl: Duration,
}

struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Shared handle; clones see the same entries.
#[derive(Clone)]
pub struct Cache {
    inner: MokaCache<String, Entry>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Cache {
    pub fn new(max_entries: u64) -> Self {
        let inner = MokaCache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryTtl)
            .build();
        Self { inner }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.inner.get(key).await?;
        match T::deserialize(entry.value.as_ref()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("discarding cache entry {}: {}", key, e);
                self.inner.invalidate(key).await;
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, ttl: Duration, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                let entry = Entry {
                    value: Arc::new(value),
                    ttl,
                };
                self.inner.insert(key.to_string(), entry).await;
            }
            Err(e) => tracing::warn!("not caching {}: {}", key, e),
        }
    }

    /// Return the cached value for `key`, or run `producer`, cache its
    /// result for `ttl` and return it. Errors are never cached.
    ///
    /// Concurrent misses may both run the producer; the last one to
    /// finish wins.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key).await {
            tracing::debug!("cache hit {}", key);
            return Ok(hit);
        }

        let value = producer().await?;
        self.set(key, ttl, &value).await;
        Ok(value)
    }

    pub async fn forget(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}
