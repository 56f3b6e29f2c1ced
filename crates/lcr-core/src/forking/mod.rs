//! Platform specific redirect construction
//!
//! A [`ForkingPolicy`] turns resolved candidates into weighted contacts. A
//! [`PlatformHandler`] is the per-platform capability table the dispatcher
//! calls for each method; the generic table answers BYE and CANCEL and
//! reports every other method as unsupported.

mod broadworks;
mod generic;
mod metaswitch;

pub use broadworks::BroadworksHandler;
pub use generic::GenericHandler;
pub use metaswitch::MetaswitchHandler;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cache::RouteCaches;
use crate::config::Platform;
use crate::error::{LcrError, Result};
use crate::model::{Carrier, CarrierId, Route, TrunkGroup};
use crate::number::{NumberNormalizer, PhoneNumber};
use crate::routing::RouteCandidateList;
use crate::service::RoutingService;
use crate::sip::{Connection, Connector, ContactEntry, QValue, SipRequest, SipResponse, SipUri, StatusCode};

/// Source of carrier details while contacts are built
#[async_trait]
pub trait CarrierLookup: Send + Sync {
    async fn carrier(&self, id: CarrierId) -> Result<Arc<Carrier>>;
}

#[async_trait]
impl CarrierLookup for RouteCaches {
    async fn carrier(&self, id: CarrierId) -> Result<Arc<Carrier>> {
        RouteCaches::carrier(self, id).await
    }
}

/// What the request being answered looks like
#[derive(Debug, Clone, Copy)]
pub struct ForkContext<'a> {
    /// Request target of the INVITE
    pub target: &'a SipUri,
    pub number: &'a PhoneNumber,
    pub normalizer: &'a NumberNormalizer,
    pub success_status: StatusCode,
}

/// How candidates are encoded into contacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkingPolicy {
    /// Request target cloned with a `dtg` trunk group tag, weights down to 0.7
    Metaswitch,
    /// Contact per trunk group address, weights down to 0.2
    Broadworks,
    /// Broadworks encoding limited to the single best trunk group
    M6,
}

impl ForkingPolicy {
    /// Tenths at or below which no further contact is emitted
    fn weight_floor(&self) -> u8 {
        match self {
            ForkingPolicy::Metaswitch => 6,
            ForkingPolicy::Broadworks | ForkingPolicy::M6 => 1,
        }
    }

    fn contact_limit(&self) -> Option<usize> {
        match self {
            ForkingPolicy::M6 => Some(1),
            ForkingPolicy::Metaswitch | ForkingPolicy::Broadworks => None,
        }
    }

    /// Final status and contacts for the candidates
    ///
    /// Weights start at 1.0 and drop by 0.1 per trunk group, walking each
    /// carrier's trunk groups in priority order. Fails with `NoRouteFound`
    /// when nothing could be offered.
    pub async fn build_response(
        &self,
        candidates: &RouteCandidateList,
        ctx: &ForkContext<'_>,
        carriers: &dyn CarrierLookup,
    ) -> Result<(StatusCode, Vec<ContactEntry>)> {
        if candidates.is_empty() {
            return Err(LcrError::NoRouteFound(ctx.number.to_string()));
        }

        let floor = self.weight_floor();
        let limit = self.contact_limit();
        let mut weight = QValue::MAX.tenths();
        let mut contacts = Vec::new();

        'candidates: for route in candidates {
            let carrier = carriers.carrier(route.carrier_id).await?;
            if carrier.trunk_groups.is_empty() {
                warn!(carrier_id = %carrier.id, carrier = %carrier.name, "Carrier has no active trunk groups, skipping");
                continue;
            }

            for trunk in &carrier.trunk_groups {
                if weight <= floor {
                    debug!(policy = ?self, "Weight floor reached, skipping further routes");
                    break 'candidates;
                }

                let uri = self.contact_uri(ctx, &carrier, route, trunk);
                debug!(carrier = %carrier.name, trunk_group = %trunk.trunk_group_id, q = %QValue::from_tenths(weight), contact = %uri, "Adding contact");
                contacts.push(ContactEntry {
                    uri,
                    q: Some(QValue::from_tenths(weight)),
                });
                weight -= 1;

                if limit.map_or(false, |max| contacts.len() >= max) {
                    break 'candidates;
                }
            }
        }

        if contacts.is_empty() {
            return Err(LcrError::NoRouteFound(ctx.number.to_string()));
        }
        Ok((ctx.success_status, contacts))
    }

    fn contact_uri(&self, ctx: &ForkContext<'_>, carrier: &Carrier, route: &Route, trunk: &TrunkGroup) -> SipUri {
        match self {
            ForkingPolicy::Metaswitch => {
                let mut uri = ctx.target.clone();
                uri.set_param("dtg", Some(trunk.trunk_group_id.clone()));
                uri
            }
            ForkingPolicy::Broadworks | ForkingPolicy::M6 => {
                let user = ctx.normalizer.format_for_route(ctx.number, carrier, route);
                SipUri::sip(trunk.ip_address.clone())
                    .with_user(user)
                    .with_port(trunk.port)
            }
        }
    }
}

/// Where a dispatched request ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    OptionsAnswered,
    AckIgnored,
    ByeAnswered,
    CancelAnswered,
    /// Routing finished and the redirect was sent
    InviteSent(StatusCode),
    /// Routing failed at some stage and an error status was sent
    InviteError(StatusCode),
    /// No handler for the method; nothing was sent
    UnhandledLogged,
}

/// Progress of an INVITE through routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteStage {
    Normalizing,
    Resolving,
    BuildingResponse,
    Sent,
    ErrorResponse,
}

impl fmt::Display for InviteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InviteStage::Normalizing => "normalizing",
            InviteStage::Resolving => "resolving",
            InviteStage::BuildingResponse => "building_response",
            InviteStage::Sent => "sent",
            InviteStage::ErrorResponse => "error_response",
        };
        f.write_str(name)
    }
}

/// Everything a handler needs to answer one request
pub struct RequestContext<'a> {
    pub service: &'a RoutingService,
    pub request: &'a SipRequest,
    pub connection: Arc<dyn Connection>,
    pub connector: Arc<dyn Connector>,
}

impl RequestContext<'_> {
    /// Send on the inbound connection; failures are logged and dropped
    pub async fn reply(&self, response: SipResponse) {
        deliver(self.connection.as_ref(), response).await;
    }
}

pub(crate) async fn deliver(connection: &dyn Connection, response: SipResponse) {
    let status = response.status;
    if let Err(e) = connection.send(response).await {
        warn!(peer = %connection.peer(), status = %status, error = %e, "Failed to send response");
    }
}

/// Per-platform answers to each SIP method
#[async_trait]
pub trait PlatformHandler: Send + Sync + fmt::Debug {
    fn platform(&self) -> Platform;

    async fn handle_options(&self, ctx: &RequestContext<'_>) -> Result<Disposition> {
        Err(self.unsupported(ctx))
    }

    async fn handle_invite(&self, ctx: &RequestContext<'_>) -> Result<Disposition> {
        Err(self.unsupported(ctx))
    }

    async fn handle_bye(&self, ctx: &RequestContext<'_>) -> Result<Disposition> {
        info!("Sending 200 OK for BYE request");
        ctx.reply(SipResponse::from_request(ctx.request, StatusCode::OK)).await;
        Ok(Disposition::ByeAnswered)
    }

    async fn handle_cancel(&self, ctx: &RequestContext<'_>) -> Result<Disposition> {
        info!("Sending 200 OK for CANCEL request");
        ctx.reply(SipResponse::from_request(ctx.request, StatusCode::OK)).await;
        Ok(Disposition::CancelAnswered)
    }

    fn unsupported(&self, ctx: &RequestContext<'_>) -> LcrError {
        LcrError::UnsupportedMethod {
            method: ctx.request.method.to_string(),
            platform: self.platform().to_string(),
        }
    }
}

/// The capability table for a configured platform
pub fn handler_for(platform: Platform) -> Arc<dyn PlatformHandler> {
    match platform {
        Platform::Generic => Arc::new(GenericHandler),
        Platform::Metaswitch => Arc::new(MetaswitchHandler),
        Platform::Broadworks => Arc::new(BroadworksHandler::new(ForkingPolicy::Broadworks)),
        Platform::M6 => Arc::new(BroadworksHandler::new(ForkingPolicy::M6)),
    }
}
