use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::candidates::RouteCandidateList;
use crate::cache::RouteCaches;
use crate::contact::parse_contact;
use crate::error::Result;
use crate::number::NumberNormalizer;
use crate::sip::SipRequest;

static NPI_ISDN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i);npi=isdn").expect("npi pattern is valid"));

/// Builds the ordered candidate list for a destination
#[derive(Debug)]
pub struct RouteResolver {
    caches: Arc<RouteCaches>,
    normalizer: NumberNormalizer,
    charge_info_header: String,
    cache_enabled: bool,
}

impl RouteResolver {
    pub fn new(
        caches: Arc<RouteCaches>,
        normalizer: NumberNormalizer,
        charge_info_header: impl Into<String>,
        cache_enabled: bool,
    ) -> Self {
        Self {
            caches,
            normalizer,
            charge_info_header: charge_info_header.into(),
            cache_enabled,
        }
    }

    /// Candidates for `destination` routing digits, best first
    ///
    /// With a billing number, that caller's overrides go first and its
    /// blacklisted carriers are removed. Either lookup failing only skips that
    /// step. Only a catalog failure is an error. An empty list means no route.
    pub async fn resolve(&self, destination: &str, billing: Option<&str>) -> Result<RouteCandidateList> {
        if !self.cache_enabled {
            debug!("Route caching disabled, flushing catalog");
            self.caches.invalidate_routes();
        }

        let routes = self.caches.routes(destination).await?;
        let mut candidates = RouteCandidateList::from(routes.as_ref().clone());
        debug!(destination, matches = candidates.len(), "Catalog lookup");

        if let Some(billing) = billing {
            match self.caches.overrides(billing).await {
                Ok(overrides) if !overrides.is_empty() => {
                    debug!(billing, count = overrides.len(), "Applying override routes");
                    candidates.prepend_overrides(&overrides);
                }
                Ok(_) => {}
                Err(e) => warn!(billing, error = %e, "Override lookup failed, continuing without overrides"),
            }

            match self.caches.blacklist(billing).await {
                Ok(blocked) if !blocked.is_empty() => {
                    let removed = candidates.remove_carriers(&blocked);
                    debug!(billing, removed, "Removed blacklisted carriers");
                }
                Ok(_) => {}
                Err(e) => warn!(billing, error = %e, "Blacklist lookup failed, continuing without blacklist"),
            }
        }

        candidates.dedup_by_carrier();
        debug!(destination, carriers = ?candidates.carrier_ids(), "Resolved candidates");
        Ok(candidates)
    }

    /// National digits of the caller's charging identity, if it has a usable one
    pub fn billing_identity(&self, request: &SipRequest) -> Option<String> {
        let value = request.header(&self.charge_info_header)?;
        let contact = parse_contact(&strip_npi(value));

        // tel: URIs have no user part, the number sits in the domain position
        let user = if contact.user_part.is_empty() {
            contact.domain
        } else {
            contact.user_part
        };

        match self.normalizer.parse(&user) {
            Ok(number) => Some(number.national_digits()),
            Err(e) => {
                debug!(header = %self.charge_info_header, error = %e, "Ignoring unusable billing identity");
                None
            }
        }
    }
}

fn strip_npi(value: &str) -> String {
    NPI_ISDN.replace_all(value, "").into_owned()
}
