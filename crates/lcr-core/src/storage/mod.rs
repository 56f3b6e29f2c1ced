//! Read queries the routing caches are loaded from
//!
//! Implementations must only materialize active routes of active carriers.
//! The in-memory store mirrors the relational queries and backs tests and
//! embedded deployments; the server provides a MySQL implementation.

mod memory;

pub use memory::MemoryRouteStore;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{Carrier, CarrierId, Route};

/// The four parameterized queries behind the routing caches
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// An active carrier with its active trunk groups, highest priority first
    ///
    /// Fails with [`StoreError::CarrierNotFound`](crate::error::StoreError::CarrierNotFound)
    /// when the carrier does not exist or is inactive.
    async fn carrier(&self, id: CarrierId) -> StoreResult<Carrier>;

    /// Active routes whose prefix matches `digits`, longest prefix first
    ///
    /// Only prefixes sharing the first two destination digits are considered.
    async fn routes_for_destination(&self, digits: &str) -> StoreResult<Vec<Route>>;

    /// Active override routes for a billing number, highest priority first
    async fn override_routes(&self, billing_number: &str) -> StoreResult<Vec<Route>>;

    /// Carriers a billing number must never be routed to
    async fn blacklisted_carriers(&self, billing_number: &str) -> StoreResult<HashSet<CarrierId>>;

    /// Short backend description for startup logs
    fn describe(&self) -> String {
        "route store".to_string()
    }
}

/// Two-digit fast filter shared by every catalog query implementation
pub fn catalog_filter_prefix(digits: &str) -> &str {
    match digits.char_indices().nth(2) {
        Some((idx, _)) => &digits[..idx],
        None => digits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_filter_prefix() {
        assert_eq!(catalog_filter_prefix("14165551234"), "14");
        assert_eq!(catalog_filter_prefix("1"), "1");
        assert_eq!(catalog_filter_prefix(""), "");
    }
}
