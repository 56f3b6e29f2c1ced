use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use tracing::{debug, warn};

use crate::error::{LcrError, Result, StoreError};

/// A bounded, expiring cache that loads missing keys on demand
///
/// Concurrent lookups of the same missing key share a single load. A load
/// that fails leaves no entry behind, so the next lookup retries it, while a
/// successful load is kept even when the value is empty.
#[derive(Clone)]
pub struct LoadingCache<K, V> {
    name: &'static str,
    inner: Cache<K, V>,
}

impl<K, V> LoadingCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache evicting least recently used entries beyond `capacity`
    /// and expiring entries `ttl` after they were written
    pub fn new(name: &'static str, capacity: u64, ttl: Duration) -> Self {
        let inner = Cache::builder()
            .name(name)
            .max_capacity(capacity)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { name, inner }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the cached value for `key`, running `load` if there is none
    pub async fn get_or_load<F>(&self, key: K, load: F) -> Result<V>
    where
        F: Future<Output = std::result::Result<V, StoreError>> + Send,
    {
        let name = self.name;
        let loading_key = key.clone();
        self.inner
            .try_get_with(key, async move {
                debug!(cache = name, key = ?loading_key, "Cache miss, loading entry");
                load.await
            })
            .await
            .map_err(|e: Arc<StoreError>| {
                warn!(cache = name, error = %e, "Cache load failed");
                LcrError::CacheLoadFailure {
                    cache: name,
                    reason: e.to_string(),
                }
            })
    }

    /// Cached value without loading
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Number of live entries once pending maintenance has run
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

impl<K, V> std::fmt::Debug for LoadingCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingCache").field("name", &self.name).finish()
    }
}
