use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{deliver, Disposition, ForkingPolicy, PlatformHandler, RequestContext};
use crate::config::Platform;
use crate::error::Result;
use crate::sip::{Connection, SipResponse, StatusCode, DEFAULT_SIP_PORT};

/// Broadworks and M6 platforms
///
/// These peers send from ephemeral ports but only accept responses on the
/// well-known port of the host in their Via, so OPTIONS answers and redirects
/// go out on a fresh connection to `<via host>:5060`. Error responses stay on
/// the inbound connection.
#[derive(Debug, Clone, Copy)]
pub struct BroadworksHandler {
    policy: ForkingPolicy,
}

impl BroadworksHandler {
    pub fn new(policy: ForkingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ForkingPolicy {
        self.policy
    }

    async fn peer_connection(&self, ctx: &RequestContext<'_>) -> Arc<dyn Connection> {
        let host = ctx
            .request
            .via_host()
            .or_else(|| ctx.request.source.map(|addr| addr.ip().to_string()));

        let Some(host) = host else {
            warn!("No Via host or source address, answering on inbound connection");
            return Arc::clone(&ctx.connection);
        };

        match ctx.connector.connect(&host, DEFAULT_SIP_PORT).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(host = %host, error = %e, "Could not reach peer on signaling port, answering on inbound connection");
                Arc::clone(&ctx.connection)
            }
        }
    }
}

#[async_trait]
impl PlatformHandler for BroadworksHandler {
    fn platform(&self) -> Platform {
        match self.policy {
            ForkingPolicy::M6 => Platform::M6,
            _ => Platform::Broadworks,
        }
    }

    async fn handle_options(&self, ctx: &RequestContext<'_>) -> Result<Disposition> {
        info!(via = ?ctx.request.via_host(), "OPTIONS received, responding 200");
        let connection = self.peer_connection(ctx).await;
        deliver(connection.as_ref(), SipResponse::from_request(ctx.request, StatusCode::OK)).await;
        Ok(Disposition::OptionsAnswered)
    }

    async fn handle_invite(&self, ctx: &RequestContext<'_>) -> Result<Disposition> {
        let outcome = ctx.service.route_invite(ctx.request, self.policy).await;
        let disposition = outcome.disposition();

        if matches!(disposition, Disposition::InviteSent(_)) {
            let connection = self.peer_connection(ctx).await;
            debug!(peer = %connection.peer(), "Sending redirect on signaling port");
            deliver(connection.as_ref(), outcome.response).await;
        } else {
            ctx.reply(outcome.response).await;
        }
        Ok(disposition)
    }
}
