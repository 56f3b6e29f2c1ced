use async_trait::async_trait;
use tracing::{debug, info};

use super::{Disposition, ForkingPolicy, PlatformHandler, RequestContext};
use crate::config::Platform;
use crate::error::Result;
use crate::sip::{SipResponse, StatusCode};

/// Metaswitch switches: answered on the inbound connection, trunk groups
/// selected with a `dtg` tag on the original request target
#[derive(Debug, Clone, Copy, Default)]
pub struct MetaswitchHandler;

#[async_trait]
impl PlatformHandler for MetaswitchHandler {
    fn platform(&self) -> Platform {
        Platform::Metaswitch
    }

    async fn handle_options(&self, ctx: &RequestContext<'_>) -> Result<Disposition> {
        info!(via = ?ctx.request.via_host(), "OPTIONS received, responding 200");
        ctx.reply(SipResponse::from_request(ctx.request, StatusCode::OK)).await;
        Ok(Disposition::OptionsAnswered)
    }

    async fn handle_invite(&self, ctx: &RequestContext<'_>) -> Result<Disposition> {
        if ctx.service.config().send_provisional {
            debug!("Sending 100 Trying for initial INVITE");
            ctx.reply(SipResponse::from_request(ctx.request, StatusCode::TRYING)).await;
        }

        let outcome = ctx.service.route_invite(ctx.request, ForkingPolicy::Metaswitch).await;
        let disposition = outcome.disposition();
        ctx.reply(outcome.response).await;
        Ok(disposition)
    }
}
