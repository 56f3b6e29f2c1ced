//! # lcr-core
//!
//! The routing decision engine of a SIP least-cost-routing redirect server.
//!
//! For each INVITE the engine normalizes the dialed number, looks up the
//! cheapest matching carrier routes, applies the caller's overrides and
//! blacklist, and answers with a redirect listing carrier trunk groups in
//! forking order, encoded the way the configured call-control platform
//! expects.
//!
//! ```text
//! transport ──► SignalingDispatcher ──► PlatformHandler
//!                                          │
//!                       NumberNormalizer ◄─┤
//!                          RouteResolver ◄─┤──► RouteCaches ──► RouteStore
//!                          ForkingPolicy ◄─┘
//! ```
//!
//! Wire framing and the database live outside this crate: requests arrive as
//! [`sip::SipRequest`] with a [`sip::Connection`] to answer on, and route data
//! comes from a [`storage::RouteStore`].

pub mod cache;
pub mod config;
pub mod contact;
pub mod dispatcher;
pub mod error;
pub mod forking;
pub mod model;
pub mod number;
pub mod routing;
pub mod service;
pub mod sip;
pub mod storage;

pub use cache::{CacheStats, LoadingCache, RouteCaches};
pub use config::{CacheConfig, LcrConfig, Platform};
pub use contact::{parse_contact, ContactInfo};
pub use dispatcher::SignalingDispatcher;
pub use error::{LcrError, Result, StoreError, StoreResult};
pub use forking::{CarrierLookup, Disposition, ForkingPolicy, InviteStage, PlatformHandler};
pub use model::{Carrier, CarrierId, Route, RouteModification, TrunkGroup};
pub use number::{NumberNormalizer, PhoneNumber};
pub use routing::{RouteCandidateList, RouteResolver};
pub use service::{InviteOutcome, RoutingService};
pub use storage::{MemoryRouteStore, RouteStore};

/// Crate version, logged at startup
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
