//! The routing service shared by every worker

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{CacheStats, RouteCaches};
use crate::config::LcrConfig;
use crate::error::{LcrError, Result};
use crate::forking::{Disposition, ForkContext, ForkingPolicy, InviteStage};
use crate::number::NumberNormalizer;
use crate::routing::RouteResolver;
use crate::sip::{SipRequest, SipResponse, StatusCode};
use crate::storage::RouteStore;

/// Final response of an INVITE and the stage routing ended in
#[derive(Debug, Clone)]
pub struct InviteOutcome {
    pub response: SipResponse,
    /// Either [`InviteStage::Sent`] or [`InviteStage::ErrorResponse`]
    pub stage: InviteStage,
}

impl InviteOutcome {
    pub fn disposition(&self) -> Disposition {
        match self.stage {
            InviteStage::Sent => Disposition::InviteSent(self.response.status),
            _ => Disposition::InviteError(self.response.status),
        }
    }
}

/// Owns the configuration, number normalizer, store handle and caches
///
/// Built once at startup and shared behind an `Arc`.
#[derive(Debug)]
pub struct RoutingService {
    config: LcrConfig,
    normalizer: NumberNormalizer,
    caches: Arc<RouteCaches>,
    resolver: RouteResolver,
}

impl RoutingService {
    pub fn new(config: LcrConfig, store: Arc<dyn RouteStore>) -> Result<Self> {
        config.validate()?;
        let normalizer = NumberNormalizer::new(&config.default_region)?;
        info!(
            platform = %config.platform,
            region = normalizer.region(),
            store = %store.describe(),
            cache_enabled = config.cache_enabled,
            "Routing service initialized"
        );

        let caches = Arc::new(RouteCaches::new(store, &config.cache));
        let resolver = RouteResolver::new(
            Arc::clone(&caches),
            normalizer.clone(),
            config.charge_info_header.clone(),
            config.cache_enabled,
        );

        Ok(Self {
            config,
            normalizer,
            caches,
            resolver,
        })
    }

    pub fn config(&self) -> &LcrConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &NumberNormalizer {
        &self.normalizer
    }

    pub fn caches(&self) -> &Arc<RouteCaches> {
        &self.caches
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    pub fn reset_caches(&self) {
        self.caches.invalidate_all();
    }

    pub async fn cache_stats(&self) -> Vec<CacheStats> {
        self.caches.stats().await
    }

    /// Route an INVITE and build its final response
    ///
    /// Never fails: every error is turned into an error response. An
    /// unparseable dialed number gets the configured error status, anything
    /// else that stops routing gets 503.
    pub async fn route_invite(&self, request: &SipRequest, policy: ForkingPolicy) -> InviteOutcome {
        let user = request.uri.user().unwrap_or_default();
        let number = match self.normalizer.parse(user) {
            Ok(number) => number,
            Err(e) => return self.failure(request, InviteStage::Normalizing, e),
        };

        let destination = number.routing_digits();
        info!(destination = %destination, "Starting routing lookup");

        let billing = self.resolver.billing_identity(request);
        let candidates = match self.resolver.resolve(&destination, billing.as_deref()).await {
            Ok(candidates) => candidates,
            Err(e) => return self.failure(request, InviteStage::Resolving, e),
        };

        let ctx = ForkContext {
            target: &request.uri,
            number: &number,
            normalizer: &self.normalizer,
            success_status: StatusCode(self.config.success_status),
        };
        match policy.build_response(&candidates, &ctx, &*self.caches).await {
            Ok((status, contacts)) => {
                let mut response = SipResponse::from_request(request, status);
                let count = contacts.len();
                for contact in contacts {
                    response.add_contact(contact.uri, contact.q);
                }
                info!(destination = %destination, contacts = count, status = %status, "Finished routing lookup");
                InviteOutcome {
                    response,
                    stage: InviteStage::Sent,
                }
            }
            Err(e) => self.failure(request, InviteStage::BuildingResponse, e),
        }
    }

    fn failure(&self, request: &SipRequest, stage: InviteStage, error: LcrError) -> InviteOutcome {
        let status = match &error {
            LcrError::InputUnparseable { .. } => StatusCode(self.config.error_status),
            _ => StatusCode::SERVICE_UNAVAILABLE,
        };

        match &error {
            LcrError::NoRouteFound(_) => info!(stage = %stage, status = %status, "{}", error),
            _ => warn!(stage = %stage, status = %status, error = %error, "Routing failed"),
        }

        InviteOutcome {
            response: SipResponse::from_request(request, status),
            stage: InviteStage::ErrorResponse,
        }
    }
}
