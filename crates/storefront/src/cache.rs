//! Response cache for catalog reads.
//!
//! A `moka` TTL cache with whole-cache invalidation. Mutations call
//! [`ResponseCache::invalidate_all`] before they report success, so a read
//! issued after a mutation returns never sees pre-mutation data.
//!
//! A populate that raced with an invalidation must not store its result:
//! it may have read the store before the mutation committed. Each populate
//! records the cache generation before computing and only inserts if the
//! generation is unchanged. The check-and-insert and the bump-and-clear run
//! under a shared/exclusive fence so neither can interleave with the other.
//! Plain lookups never touch the fence.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::RwLock;

use crate::models::{PriceRange, Product};

/// Cache for price-range product listings.
pub type CatalogCache = ResponseCache<PriceRange, Arc<Vec<Product>>>;

/// TTL cache with a generation fence against stale populates.
pub struct ResponseCache<K, V> {
    entries: Cache<K, V>,
    generation: AtomicU64,
    fence: RwLock<()>,
}

impl<K, V> ResponseCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache whose entries live for `ttl`, holding at most
    /// `max_entries`.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self {
            entries,
            generation: AtomicU64::new(0),
            fence: RwLock::new(()),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns. Failures are not cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.entries.get(&key).await {
            tracing::debug!("Response cache hit");
            return Ok(value);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = compute().await?;

        let _fence = self.fence.read().await;
        if self.generation.load(Ordering::Acquire) == generation {
            self.entries.insert(key, value.clone()).await;
        } else {
            tracing::debug!("Cache invalidated during populate, not storing result");
        }

        Ok(value)
    }

    /// Drop every entry and reject populates that started before this call.
    pub async fn invalidate_all(&self) {
        let _fence = self.fence.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        tracing::debug!("Response cache cleared");
    }

    /// Look up `key` without populating.
    pub async fn peek(&self, key: &K) -> Option<V> {
        self.entries.get(key).await
    }

    /// Number of invalidations so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
