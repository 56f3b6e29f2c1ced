use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::{CarrierId, Route};

/// Routes in forking order, best candidate first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteCandidateList {
    routes: Vec<Route>,
}

impl RouteCandidateList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Route> {
        self.routes.iter()
    }

    pub fn first(&self) -> Option<&Route> {
        self.routes.first()
    }

    pub fn carrier_ids(&self) -> Vec<CarrierId> {
        self.routes.iter().map(|r| r.carrier_id).collect()
    }

    pub fn into_routes(self) -> Vec<Route> {
        self.routes
    }

    /// Put override routes ahead of everything, keeping their given order
    pub fn prepend_overrides(&mut self, overrides: &[Route]) {
        if overrides.is_empty() {
            return;
        }
        let mut routes = Vec::with_capacity(overrides.len() + self.routes.len());
        routes.extend_from_slice(overrides);
        routes.append(&mut self.routes);
        self.routes = routes;
    }

    /// Remove every route of any of the given carriers, returning how many went
    pub fn remove_carriers(&mut self, carriers: &HashSet<CarrierId>) -> usize {
        let before = self.routes.len();
        self.routes.retain(|r| !carriers.contains(&r.carrier_id));
        before - self.routes.len()
    }

    /// Keep only the first route of each carrier
    pub fn dedup_by_carrier(&mut self) {
        let mut seen = HashSet::new();
        self.routes.retain(|r| seen.insert(r.carrier_id));
    }

    /// Longest prefix first, then ascending price; otherwise current order
    pub fn order_by_specificity_then_price(&mut self) {
        self.routes.sort_by(|a, b| {
            b.digits
                .len()
                .cmp(&a.digits.len())
                .then_with(|| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal))
        });
    }
}

impl From<Vec<Route>> for RouteCandidateList {
    fn from(routes: Vec<Route>) -> Self {
        Self { routes }
    }
}

impl<'a> IntoIterator for &'a RouteCandidateList {
    type Item = &'a Route;
    type IntoIter = std::slice::Iter<'a, Route>;

    fn into_iter(self) -> Self::IntoIter {
        self.routes.iter()
    }
}
