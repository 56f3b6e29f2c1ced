//! Bounded per-request processing
//!
//! Every inbound request becomes its own task. A semaphore sized by
//! `worker_pool_size` caps how many run at once; [`SignalingDispatcher::dispatch`]
//! waits for a free permit before spawning, so a saturated pool stalls the
//! caller's receive loop instead of queueing. Requests are independent: there
//! is no ordering between messages of the same call.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{LcrError, Result};
use crate::forking::{handler_for, Disposition, PlatformHandler, RequestContext};
use crate::service::RoutingService;
use crate::sip::{Connection, Connector, Method, SipRequest};

pub struct SignalingDispatcher {
    service: Arc<RoutingService>,
    handler: Arc<dyn PlatformHandler>,
    connector: Arc<dyn Connector>,
    workers: Arc<Semaphore>,
    pool_size: usize,
}

impl SignalingDispatcher {
    /// Dispatcher for the platform configured on `service`
    pub fn new(service: Arc<RoutingService>, connector: Arc<dyn Connector>) -> Self {
        let handler = handler_for(service.config().platform);
        Self::with_handler(service, handler, connector)
    }

    pub fn with_handler(
        service: Arc<RoutingService>,
        handler: Arc<dyn PlatformHandler>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let pool_size = service.config().worker_pool_size;
        info!(platform = %handler.platform(), workers = pool_size, "Signaling dispatcher ready");
        Self {
            service,
            handler,
            connector,
            workers: Arc::new(Semaphore::new(pool_size)),
            pool_size,
        }
    }

    pub fn service(&self) -> &Arc<RoutingService> {
        &self.service
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Workers not currently processing a request
    pub fn idle_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Wait for a free worker and process the request on it
    pub async fn dispatch(
        self: &Arc<Self>,
        request: SipRequest,
        connection: Arc<dyn Connection>,
    ) -> Result<JoinHandle<Disposition>> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| LcrError::Transport("worker pool closed".to_string()))?;

        let span = info_span!(
            "sip_request",
            method = %request.method,
            call_id = %request.call_id().unwrap_or("-"),
            peer = %connection.peer(),
        );
        let dispatcher = Arc::clone(self);
        Ok(tokio::spawn(
            async move {
                let disposition = dispatcher.process(request, connection).await;
                drop(permit);
                disposition
            }
            .instrument(span),
        ))
    }

    /// Classify a request by method and run the platform handler for it
    pub async fn process(&self, request: SipRequest, connection: Arc<dyn Connection>) -> Disposition {
        let ctx = RequestContext {
            service: &self.service,
            request: &request,
            connection,
            connector: Arc::clone(&self.connector),
        };

        let result = match &request.method {
            Method::Ack => {
                debug!("ACK needs no response");
                return Disposition::AckIgnored;
            }
            Method::Options => self.handler.handle_options(&ctx).await,
            Method::Invite => self.handler.handle_invite(&ctx).await,
            Method::Bye => self.handler.handle_bye(&ctx).await,
            Method::Cancel => self.handler.handle_cancel(&ctx).await,
            other => {
                info!(method = %other, "Got SIP method with no handler configured");
                return Disposition::UnhandledLogged;
            }
        };

        match result {
            Ok(disposition) => {
                debug!(?disposition, "Request finished");
                disposition
            }
            Err(e @ LcrError::UnsupportedMethod { .. }) => {
                warn!(error = %e, "Request left unanswered");
                Disposition::UnhandledLogged
            }
            Err(e) => {
                error!(error = %e, "Request handler failed");
                Disposition::UnhandledLogged
            }
        }
    }

    /// Refuse further dispatches; requests already running finish
    pub fn close(&self) {
        self.workers.close();
    }
}

impl std::fmt::Debug for SignalingDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingDispatcher")
            .field("platform", &self.handler.platform())
            .field("pool_size", &self.pool_size)
            .finish()
    }
}
