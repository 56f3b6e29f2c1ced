//! Process shell around [`lcr_core`]: configuration file, logging, the MySQL
//! route store, UDP signaling and the HTTP admin interface.

pub mod admin;
pub mod codec;
pub mod config;
pub mod logging;
pub mod store;
pub mod transport;

pub use config::ServerConfig;
pub use store::MySqlRouteStore;
pub use transport::{UdpConnector, UdpTransport};
