//! MySQL/MariaDB route store
//!
//! Schema (tables owned by the provisioning side):
//!
//! - `carrier(id, carrier_name, active, enable_e164)`
//! - `trunkgroup(id, carrier_id, tg_id, ipAddress, port, priority, active)`
//! - `routes(id, carrier_id, digits, price, active, route_modification, modification_string)`
//! - `source_did_routes(id, carrier_id, billing_number, priority, active, route_modification, modification_string)`
//! - `blacklist_routes(billing_number, carrier_id)`

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use tracing::{debug, info};

use lcr_core::model::RouteModification;
use lcr_core::storage::catalog_filter_prefix;
use lcr_core::{Carrier, CarrierId, Route, RouteStore, StoreError, StoreResult};

use crate::config::DatabaseConfig;

const CARRIER_QUERY: &str = "SELECT CAST(id AS SIGNED) AS id, carrier_name, \
     CAST(active AS SIGNED) AS active, CAST(enable_e164 AS SIGNED) AS enable_e164 \
     FROM carrier WHERE id = ?";

const TRUNK_GROUP_QUERY: &str = "SELECT tg_id, ipAddress, CAST(port AS SIGNED) AS port, \
     CAST(priority AS SIGNED) AS priority \
     FROM trunkgroup WHERE carrier_id = ? AND active = 1 ORDER BY priority DESC";

const CATALOG_QUERY: &str = "SELECT CAST(routes.id AS SIGNED) AS id, digits, CAST(price AS DOUBLE) AS price, \
     CAST(carrier_id AS SIGNED) AS carrier_id, route_modification, modification_string \
     FROM routes, carrier \
     WHERE routes.active > 0 AND carrier.active > 0 AND carrier.id = routes.carrier_id \
     AND LEFT(?, LENGTH(digits)) = digits AND digits LIKE CONCAT(?, '%') \
     ORDER BY LENGTH(digits) DESC";

const OVERRIDE_QUERY: &str = "SELECT CAST(source_did_routes.id AS SIGNED) AS id, billing_number, \
     CAST(carrier_id AS SIGNED) AS carrier_id, route_modification, modification_string \
     FROM source_did_routes, carrier \
     WHERE source_did_routes.active > 0 AND carrier.active > 0 \
     AND carrier.id = source_did_routes.carrier_id AND billing_number = ? \
     ORDER BY priority DESC";

const BLACKLIST_QUERY: &str = "SELECT CAST(carrier_id AS SIGNED) AS carrier_id \
     FROM blacklist_routes WHERE billing_number = ?";

/// Route store backed by a pooled MySQL connection
#[derive(Clone)]
pub struct MySqlRouteStore {
    pool: MySqlPool,
    server: String,
}

impl MySqlRouteStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let options = config
            .connect_options()
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(query_error)?;
        info!(server = %config.server, database = %config.database, "Connected to route database");
        Ok(Self {
            pool,
            server: config.server.clone(),
        })
    }

    /// Version string reported by the database server
    pub async fn server_version(&self) -> StoreResult<String> {
        let row = sqlx::query("SELECT VERSION() AS version")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;
        row.try_get("version").map_err(query_error)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

/// Narrow an integer column, rejecting values the target type cannot hold
fn column_in_range<T: TryFrom<i64>>(tg_id: &str, column: &str, value: i64) -> StoreResult<T> {
    T::try_from(value)
        .map_err(|_| StoreError::Query(format!("trunk group {} has invalid {} {}", tg_id, column, value)))
}

fn modification(row: &MySqlRow) -> StoreResult<RouteModification> {
    let kind: Option<String> = row.try_get("route_modification").map_err(query_error)?;
    let value: Option<String> = row.try_get("modification_string").map_err(query_error)?;
    Ok(RouteModification::from_parts(kind.as_deref(), value.as_deref()))
}

#[async_trait]
impl RouteStore for MySqlRouteStore {
    async fn carrier(&self, id: CarrierId) -> StoreResult<Carrier> {
        let row = sqlx::query(CARRIER_QUERY)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?
            .ok_or(StoreError::CarrierNotFound(id))?;

        let active: i64 = row.try_get("active").map_err(query_error)?;
        if active <= 0 {
            return Err(StoreError::CarrierNotFound(id));
        }
        let e164: i64 = row.try_get("enable_e164").map_err(query_error)?;
        let name: String = row.try_get("carrier_name").map_err(query_error)?;
        let mut carrier = Carrier::new(id, name).with_e164(e164 > 0);

        let trunks = sqlx::query(TRUNK_GROUP_QUERY)
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        for row in trunks {
            let tg_id: String = row.try_get("tg_id").map_err(query_error)?;
            let ip: String = row.try_get("ipAddress").map_err(query_error)?;
            let port: i64 = row.try_get("port").map_err(query_error)?;
            let priority: i64 = row.try_get("priority").map_err(query_error)?;
            let port: u16 = column_in_range(&tg_id, "port", port)?;
            debug!(carrier = %id, trunk_group = %tg_id, "Loaded trunk group");
            let priority: i32 = column_in_range(&tg_id, "priority", priority)?;
            carrier = carrier.with_trunk_group(tg_id, ip, port, priority);
        }
        carrier.order_trunk_groups();
        Ok(carrier)
    }

    async fn routes_for_destination(&self, digits: &str) -> StoreResult<Vec<Route>> {
        let rows = sqlx::query(CATALOG_QUERY)
            .bind(digits)
            .bind(catalog_filter_prefix(digits))
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| -> StoreResult<Route> {
                let id: i64 = row.try_get("id").map_err(query_error)?;
                let carrier_id: i64 = row.try_get("carrier_id").map_err(query_error)?;
                let prefix: String = row.try_get("digits").map_err(query_error)?;
                let price: f64 = row.try_get("price").map_err(query_error)?;
                Ok(Route::new(id, CarrierId(carrier_id), prefix, price).with_modification(modification(row)?))
            })
            .collect()
    }

    async fn override_routes(&self, billing_number: &str) -> StoreResult<Vec<Route>> {
        let rows = sqlx::query(OVERRIDE_QUERY)
            .bind(billing_number)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| -> StoreResult<Route> {
                let id: i64 = row.try_get("id").map_err(query_error)?;
                let carrier_id: i64 = row.try_get("carrier_id").map_err(query_error)?;
                let number: String = row.try_get("billing_number").map_err(query_error)?;
                Ok(Route::new(id, CarrierId(carrier_id), number, 0.0).with_modification(modification(row)?))
            })
            .collect()
    }

    async fn blacklisted_carriers(&self, billing_number: &str) -> StoreResult<HashSet<CarrierId>> {
        let rows = sqlx::query(BLACKLIST_QUERY)
            .bind(billing_number)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| row.try_get::<i64, _>("carrier_id").map(CarrierId).map_err(query_error))
            .collect()
    }

    fn describe(&self) -> String {
        format!("mysql://{}", self.server)
    }
}

impl std::fmt::Debug for MySqlRouteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlRouteStore").field("server", &self.server).finish()
    }
}
