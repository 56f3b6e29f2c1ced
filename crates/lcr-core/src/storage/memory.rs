use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;

use super::{catalog_filter_prefix, RouteStore};
use crate::error::{StoreError, StoreResult};
use crate::model::{Carrier, CarrierId, Route};

#[derive(Debug, Clone)]
struct OverrideEntry {
    billing_number: String,
    priority: i32,
    route: Route,
}

#[derive(Debug, Default)]
struct Tables {
    carriers: HashMap<CarrierId, Carrier>,
    routes: Vec<Route>,
    overrides: Vec<OverrideEntry>,
    blacklist: HashMap<String, HashSet<CarrierId>>,
}

impl Tables {
    fn carrier_active(&self, id: CarrierId) -> bool {
        self.carriers.get(&id).map(|c| c.active).unwrap_or(false)
    }
}

/// Route tables held in memory
///
/// Answers queries with the same filtering and ordering as the relational
/// store. Rows can be changed while the store is shared; the caches in front
/// of it will only see the change once the affected entries expire or are
/// invalidated.
#[derive(Debug, Default)]
pub struct MemoryRouteStore {
    tables: RwLock<Tables>,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_carrier(&self, carrier: Carrier) {
        self.tables.write().carriers.insert(carrier.id, carrier);
    }

    pub fn set_carrier_active(&self, id: CarrierId, active: bool) {
        if let Some(carrier) = self.tables.write().carriers.get_mut(&id) {
            carrier.active = active;
        }
    }

    pub fn insert_route(&self, route: Route) {
        self.tables.write().routes.push(route);
    }

    /// Add a caller-specific override; higher priority is offered first
    pub fn insert_override(&self, billing_number: impl Into<String>, priority: i32, route: Route) {
        self.tables.write().overrides.push(OverrideEntry {
            billing_number: billing_number.into(),
            priority,
            route,
        });
    }

    pub fn block_carrier(&self, billing_number: impl Into<String>, carrier_id: CarrierId) {
        self.tables
            .write()
            .blacklist
            .entry(billing_number.into())
            .or_default()
            .insert(carrier_id);
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn carrier(&self, id: CarrierId) -> StoreResult<Carrier> {
        let tables = self.tables.read();
        let mut carrier = tables
            .carriers
            .get(&id)
            .filter(|c| c.active)
            .cloned()
            .ok_or(StoreError::CarrierNotFound(id))?;
        carrier.order_trunk_groups();
        Ok(carrier)
    }

    async fn routes_for_destination(&self, digits: &str) -> StoreResult<Vec<Route>> {
        let tables = self.tables.read();
        let filter = catalog_filter_prefix(digits);

        let mut routes: Vec<Route> = tables
            .routes
            .iter()
            .filter(|r| r.active && tables.carrier_active(r.carrier_id))
            .filter(|r| digits.starts_with(r.digits.as_str()) && r.digits.starts_with(filter))
            .cloned()
            .collect();
        routes.sort_by(|a, b| b.digits.len().cmp(&a.digits.len()));

        trace!(digits, matches = routes.len(), "Memory catalog query");
        Ok(routes)
    }

    async fn override_routes(&self, billing_number: &str) -> StoreResult<Vec<Route>> {
        let tables = self.tables.read();
        let mut entries: Vec<&OverrideEntry> = tables
            .overrides
            .iter()
            .filter(|o| o.billing_number == billing_number)
            .filter(|o| o.route.active && tables.carrier_active(o.route.carrier_id))
            .collect();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));

        Ok(entries.into_iter().map(|o| o.route.clone()).collect())
    }

    async fn blacklisted_carriers(&self, billing_number: &str) -> StoreResult<HashSet<CarrierId>> {
        Ok(self
            .tables
            .read()
            .blacklist
            .get(billing_number)
            .cloned()
            .unwrap_or_default())
    }

    fn describe(&self) -> String {
        let tables = self.tables.read();
        format!(
            "in-memory store ({} carriers, {} routes)",
            tables.carriers.len(),
            tables.routes.len()
        )
    }
}
