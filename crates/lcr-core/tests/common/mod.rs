//! Shared fixtures for the lcr-core integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use lcr_core::sip::{Connection, Connector, Method, SipRequest, SipResponse};
use lcr_core::{
    Carrier, CarrierId, LcrConfig, LcrError, MemoryRouteStore, Platform, Route, RouteStore, RoutingService, StoreError,
    StoreResult,
};

pub const DIALED: &str = "4169671111";
pub const ROUTING_DIGITS: &str = "14169671111";
pub const BILLING: &str = "6132221234";

/// Connection that keeps every response it is asked to send
#[derive(Debug, Default)]
pub struct RecordingConnection {
    pub peer: String,
    sent: Mutex<Vec<SipResponse>>,
}

impl RecordingConnection {
    pub fn new(peer: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            peer: peer.into(),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<SipResponse> {
        self.sent.lock().clone()
    }

    pub fn statuses(&self) -> Vec<u16> {
        self.sent.lock().iter().map(|r| r.status.as_u16()).collect()
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn send(&self, response: SipResponse) -> lcr_core::Result<()> {
        self.sent.lock().push(response);
        Ok(())
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// Connector handing out recording connections and remembering the targets
#[derive(Debug, Default)]
pub struct RecordingConnector {
    opened: Mutex<Vec<(String, u16, Arc<RecordingConnection>)>>,
    pub refuse: AtomicBool,
}

impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn targets(&self) -> Vec<(String, u16)> {
        self.opened.lock().iter().map(|(h, p, _)| (h.clone(), *p)).collect()
    }

    /// Statuses sent over every connection this connector opened
    pub fn statuses(&self) -> Vec<u16> {
        self.opened
            .lock()
            .iter()
            .flat_map(|(_, _, c)| c.statuses())
            .collect()
    }

    pub fn sent(&self) -> Vec<SipResponse> {
        self.opened.lock().iter().flat_map(|(_, _, c)| c.sent()).collect()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(&self, host: &str, port: u16) -> lcr_core::Result<Arc<dyn Connection>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(LcrError::Transport(format!("connection to {}:{} refused", host, port)));
        }
        let connection = RecordingConnection::new(format!("{}:{}", host, port));
        self.opened
            .lock()
            .push((host.to_string(), port, Arc::clone(&connection)));
        Ok(connection)
    }
}

/// Store wrapper counting queries, optionally slow or failing
pub struct CountingStore {
    pub inner: MemoryRouteStore,
    pub carrier_loads: AtomicUsize,
    pub route_loads: AtomicUsize,
    pub override_loads: AtomicUsize,
    pub blacklist_loads: AtomicUsize,
    pub fail_routes: AtomicBool,
    pub fail_overrides: AtomicBool,
    pub delay: Duration,
}

impl CountingStore {
    pub fn new(inner: MemoryRouteStore) -> Self {
        Self {
            inner,
            carrier_loads: AtomicUsize::new(0),
            route_loads: AtomicUsize::new(0),
            override_loads: AtomicUsize::new(0),
            blacklist_loads: AtomicUsize::new(0),
            fail_routes: AtomicBool::new(false),
            fail_overrides: AtomicBool::new(false),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl RouteStore for CountingStore {
    async fn carrier(&self, id: CarrierId) -> StoreResult<Carrier> {
        self.carrier_loads.fetch_add(1, Ordering::SeqCst);
        self.inner.carrier(id).await
    }

    async fn routes_for_destination(&self, digits: &str) -> StoreResult<Vec<Route>> {
        self.route_loads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_routes.load(Ordering::SeqCst) {
            return Err(StoreError::Query("connection reset".to_string()));
        }
        self.inner.routes_for_destination(digits).await
    }

    async fn override_routes(&self, billing_number: &str) -> StoreResult<Vec<Route>> {
        self.override_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_overrides.load(Ordering::SeqCst) {
            return Err(StoreError::Query("connection reset".to_string()));
        }
        self.inner.override_routes(billing_number).await
    }

    async fn blacklisted_carriers(&self, billing_number: &str) -> StoreResult<HashSet<CarrierId>> {
        self.blacklist_loads.fetch_add(1, Ordering::SeqCst);
        self.inner.blacklisted_carriers(billing_number).await
    }
}

/// A carrier with a single trunk group named `tg<id>` at `10.0.0.<id>`
pub fn carrier(id: i64) -> Carrier {
    Carrier::new(CarrierId(id), format!("carrier-{}", id)).with_trunk_group(
        format!("tg{}", id),
        format!("10.0.0.{}", id),
        5060,
        1,
    )
}

/// Store with carriers 1..=5 each holding a route for `1416967` priced by id
pub fn five_carrier_store() -> MemoryRouteStore {
    let store = MemoryRouteStore::new();
    for id in 1..=5 {
        store.insert_carrier(carrier(id));
        store.insert_route(Route::new(100 + id, CarrierId(id), "1416967", 0.01 * id as f64));
    }
    store
}

/// Route engine logs to the test output when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

pub fn service(platform: Platform, store: Arc<dyn RouteStore>) -> Arc<RoutingService> {
    init_tracing();
    let config = LcrConfig::default().with_platform(platform);
    Arc::new(RoutingService::new(config, store).unwrap())
}

pub fn request(method: Method, user: &str) -> SipRequest {
    SipRequest::new(method.clone(), format!("sip:{}@lcr.example.com;user=phone", user).parse().unwrap())
        .with_header("Via", "SIP/2.0/UDP 192.0.2.10:49170;branch=z9hG4bK-1")
        .with_header("From", "<sip:6132221234@192.0.2.10>;tag=f1")
        .with_header("To", format!("<sip:{}@lcr.example.com>", user))
        .with_header("Call-ID", "call-1@192.0.2.10")
        .with_header("CSeq", format!("1 {}", method))
        .with_source("192.0.2.10:49170".parse().unwrap())
}

pub fn invite_from(user: &str, billing: &str) -> SipRequest {
    request(Method::Invite, user).with_header("P-Charge-Info", format!("<sip:{}@192.0.2.10;npi=ISDN>", billing))
}
