//! Carrier, trunk group and route snapshots
//!
//! Values here are built fresh on every cache load from the
//! [`RouteStore`](crate::storage::RouteStore) and shared behind `Arc`s. They are
//! never mutated once constructed.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Identifier of a carrier row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CarrierId(pub i64);

impl fmt::Display for CarrierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CarrierId {
    fn from(id: i64) -> Self {
        CarrierId(id)
    }
}

/// A carrier's signaling endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrunkGroup {
    pub carrier_id: CarrierId,
    /// Value placed in the `dtg` parameter for tag-routed platforms
    pub trunk_group_id: String,
    pub ip_address: String,
    pub port: u16,
    /// Higher is preferred within a carrier
    pub priority: i32,
}

/// A downstream carrier and its trunk groups, in descending priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    pub id: CarrierId,
    pub name: String,
    pub active: bool,
    /// Send the dialed number as received instead of out-of-country format
    pub use_e164: bool,
    pub trunk_groups: Vec<TrunkGroup>,
}

impl Carrier {
    pub fn new(id: CarrierId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            use_e164: false,
            trunk_groups: Vec::new(),
        }
    }

    pub fn with_e164(mut self, use_e164: bool) -> Self {
        self.use_e164 = use_e164;
        self
    }

    pub fn with_trunk_group(
        mut self,
        trunk_group_id: impl Into<String>,
        ip_address: impl Into<String>,
        port: u16,
        priority: i32,
    ) -> Self {
        self.trunk_groups.push(TrunkGroup {
            carrier_id: self.id,
            trunk_group_id: trunk_group_id.into(),
            ip_address: ip_address.into(),
            port,
            priority,
        });
        self
    }

    /// Re-sort trunk groups by descending priority, keeping insertion order for ties
    pub fn order_trunk_groups(&mut self) {
        self.trunk_groups.sort_by(|a, b| b.priority.cmp(&a.priority));
    }
}

/// Digit manipulation applied to the dialed number before it is handed to a carrier
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RouteModification {
    #[default]
    None,
    Prepend(String),
    Append(String),
    /// A kind stored in the database that this engine does not know how to apply
    Unsupported { kind: String, value: String },
}

impl RouteModification {
    /// Build a modification from the stored kind and value columns
    pub fn from_parts(kind: Option<&str>, value: Option<&str>) -> Self {
        let value = value.unwrap_or_default().to_string();
        match kind.map(|k| k.trim().to_ascii_uppercase()) {
            None => RouteModification::None,
            Some(k) if k.is_empty() || k == "NONE" => RouteModification::None,
            Some(k) if k == "PREPEND" => RouteModification::Prepend(value),
            Some(k) if k == "APPEND" => RouteModification::Append(value),
            Some(k) => {
                warn!(kind = %k, "Unsupported route modification kind stored for route");
                RouteModification::Unsupported { kind: k, value }
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RouteModification::None)
    }
}

impl fmt::Display for RouteModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteModification::None => write!(f, "NONE"),
            RouteModification::Prepend(v) => write!(f, "PREPEND({})", v),
            RouteModification::Append(v) => write!(f, "APPEND({})", v),
            RouteModification::Unsupported { kind, value } => write!(f, "{}({})", kind, value),
        }
    }
}

/// A priced prefix route towards one carrier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: i64,
    pub carrier_id: CarrierId,
    /// Matched digit prefix, or the billing number for override routes
    pub digits: String,
    pub price: f64,
    pub active: bool,
    pub modification: RouteModification,
}

impl Route {
    pub fn new(route_id: i64, carrier_id: CarrierId, digits: impl Into<String>, price: f64) -> Self {
        Self {
            route_id,
            carrier_id,
            digits: digits.into(),
            price,
            active: true,
            modification: RouteModification::None,
        }
    }

    pub fn with_modification(mut self, modification: RouteModification) -> Self {
        self.modification = modification;
        self
    }
}
