//! Transport seams
//!
//! The engine never touches sockets. A request arrives with a [`Connection`]
//! to answer on, and a [`Connector`] opens connections to other peers.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::message::SipResponse;
use crate::error::Result;

/// A channel back to a signaling peer
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Hand a response to the transport
    ///
    /// Returns once the transport has accepted the message; delivery is not
    /// confirmed.
    async fn send(&self, response: SipResponse) -> Result<()>;

    /// Human readable peer description for logs
    fn peer(&self) -> String;
}

/// Opens connections to arbitrary peers
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self, host: &str, port: u16) -> Result<Arc<dyn Connection>>;
}
