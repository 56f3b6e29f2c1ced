//! The slice of SIP the routing engine consumes from its transport

pub mod message;
pub mod method;
pub mod transport;
pub mod uri;

pub use message::{ContactEntry, Header, QValue, SipRequest, SipResponse, StatusCode};
pub use method::Method;
pub use transport::{Connection, Connector};
pub use uri::{Scheme, SipUri, UriParam};

/// Port peers listen on for replies regardless of the port they sent from
pub const DEFAULT_SIP_PORT: u16 = 5060;
