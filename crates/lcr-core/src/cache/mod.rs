//! Routing caches
//!
//! Four independent caches sit in front of the [`RouteStore`]:
//!
//! | Cache     | Key                 | Value                          | Default TTL |
//! |-----------|---------------------|--------------------------------|-------------|
//! | carriers  | carrier id          | carrier with its trunk groups  | 60 min      |
//! | routes    | destination digits  | matching routes, best first    | 15 min      |
//! | overrides | billing number      | override routes, best first    | 15 min      |
//! | blacklist | billing number      | blocked carrier ids            | 60 min      |
//!
//! Expiry counts from the time an entry was written. Capacity eviction is
//! independent of expiry.

mod loading;

pub use loading::LoadingCache;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::model::{Carrier, CarrierId, Route};
use crate::routing::RouteCandidateList;
use crate::storage::RouteStore;

/// Entry count of one cache, as reported by the admin interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub entries: u64,
}

/// The carrier directory, route catalog, override and blacklist caches
pub struct RouteCaches {
    store: Arc<dyn RouteStore>,
    carriers: LoadingCache<CarrierId, Arc<Carrier>>,
    routes: LoadingCache<String, Arc<Vec<Route>>>,
    overrides: LoadingCache<String, Arc<Vec<Route>>>,
    blacklist: LoadingCache<String, Arc<HashSet<CarrierId>>>,
}

impl RouteCaches {
    pub fn new(store: Arc<dyn RouteStore>, config: &CacheConfig) -> Self {
        let capacity = config.max_capacity;
        Self {
            store,
            carriers: LoadingCache::new("carriers", capacity, config.carrier_ttl()),
            routes: LoadingCache::new("routes", capacity, config.route_ttl()),
            overrides: LoadingCache::new("overrides", capacity, config.override_ttl()),
            blacklist: LoadingCache::new("blacklist", capacity, config.blacklist_ttl()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RouteStore> {
        &self.store
    }

    pub async fn carrier(&self, id: CarrierId) -> Result<Arc<Carrier>> {
        let store = Arc::clone(&self.store);
        self.carriers
            .get_or_load(id, async move { store.carrier(id).await.map(Arc::new) })
            .await
    }

    /// Catalog routes for destination digits
    ///
    /// The store returns the longest prefixes first; equally specific routes
    /// are then put in ascending price order, keeping store order for equal
    /// prices.
    pub async fn routes(&self, digits: &str) -> Result<Arc<Vec<Route>>> {
        let store = Arc::clone(&self.store);
        let key = digits.to_string();
        self.routes
            .get_or_load(key.clone(), async move {
                let routes = store.routes_for_destination(&key).await?;
                let mut candidates = RouteCandidateList::from(routes);
                candidates.order_by_specificity_then_price();
                Ok(Arc::new(candidates.into_routes()))
            })
            .await
    }

    pub async fn overrides(&self, billing_number: &str) -> Result<Arc<Vec<Route>>> {
        let store = Arc::clone(&self.store);
        let key = billing_number.to_string();
        self.overrides
            .get_or_load(key.clone(), async move {
                store.override_routes(&key).await.map(Arc::new)
            })
            .await
    }

    pub async fn blacklist(&self, billing_number: &str) -> Result<Arc<HashSet<CarrierId>>> {
        let store = Arc::clone(&self.store);
        let key = billing_number.to_string();
        self.blacklist
            .get_or_load(key.clone(), async move {
                store.blacklisted_carriers(&key).await.map(Arc::new)
            })
            .await
    }

    /// Drop every catalog entry
    pub fn invalidate_routes(&self) {
        self.routes.invalidate_all();
    }

    /// Drop every entry of all four caches
    pub fn invalidate_all(&self) {
        self.carriers.invalidate_all();
        self.routes.invalidate_all();
        self.overrides.invalidate_all();
        self.blacklist.invalidate_all();
        info!("All routing caches invalidated");
    }

    pub async fn stats(&self) -> Vec<CacheStats> {
        vec![
            CacheStats { name: self.carriers.name(), entries: self.carriers.entry_count().await },
            CacheStats { name: self.routes.name(), entries: self.routes.entry_count().await },
            CacheStats { name: self.overrides.name(), entries: self.overrides.entry_count().await },
            CacheStats { name: self.blacklist.name(), entries: self.blacklist.entry_count().await },
        ]
    }
}

impl std::fmt::Debug for RouteCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteCaches")
            .field("store", &self.store.describe())
            .finish()
    }
}
