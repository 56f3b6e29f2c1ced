//! Parsed SIP requests and the redirect responses built from them

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::method::Method;
use super::uri::SipUri;

/// A SIP response status code
///
/// The routing engine only ever produces a handful of codes, but the success
/// and error codes are configurable so any value in `100..=699` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const TRYING: StatusCode = StatusCode(100);
    pub const OK: StatusCode = StatusCode(200);
    pub const MOVED_TEMPORARILY: StatusCode = StatusCode(302);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Canonical reason phrase, falling back to the class name for unlisted codes
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            100 => "Trying",
            180 => "Ringing",
            181 => "Call Is Being Forwarded",
            182 => "Queued",
            183 => "Session Progress",
            200 => "OK",
            202 => "Accepted",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Moved Temporarily",
            305 => "Use Proxy",
            380 => "Alternative Service",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            408 => "Request Timeout",
            410 => "Gone",
            480 => "Temporarily Unavailable",
            484 => "Address Incomplete",
            486 => "Busy Here",
            487 => "Request Terminated",
            488 => "Not Acceptable Here",
            500 => "Server Internal Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Server Time-out",
            600 => "Busy Everywhere",
            603 => "Decline",
            604 => "Does Not Exist Anywhere",
            100..=199 => "Provisional",
            200..=299 => "Success",
            300..=399 => "Redirection",
            400..=499 => "Client Error",
            500..=599 => "Server Error",
            _ => "Global Failure",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

/// A forking weight in tenths, rendered as `q=1.0`, `q=0.9`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QValue(u8);

impl QValue {
    pub const MAX: QValue = QValue(10);

    /// Build from tenths, clamped to `0..=10`
    pub fn from_tenths(tenths: u8) -> Self {
        QValue(tenths.min(10))
    }

    pub fn tenths(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for QValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Expand RFC 3261 compact header names
fn canonical_name(name: &str) -> &str {
    match name {
        "v" | "V" => "Via",
        "f" | "F" => "From",
        "t" | "T" => "To",
        "i" | "I" => "Call-ID",
        "m" | "M" => "Contact",
        "l" | "L" => "Content-Length",
        "c" | "C" => "Content-Type",
        other => other,
    }
}

fn header_matches(header: &str, wanted: &str) -> bool {
    canonical_name(header).eq_ignore_ascii_case(canonical_name(wanted))
}

/// A request as delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct SipRequest {
    pub method: Method,
    pub uri: SipUri,
    pub headers: Vec<Header>,
    /// Address the datagram arrived from
    pub source: Option<SocketAddr>,
}

impl SipRequest {
    pub fn new(method: Method, uri: SipUri) -> Self {
        Self {
            method,
            uri,
            headers: Vec::new(),
            source: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_source(mut self, source: SocketAddr) -> Self {
        self.source = Some(source);
        self
    }

    /// First value of a header, matched case-insensitively and by compact form
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| header_matches(&h.name, name))
            .map(|h| h.value.as_str())
    }

    /// Every value of a header in message order
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| header_matches(&h.name, name))
            .map(|h| h.value.as_str())
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header("Call-ID")
    }

    /// Host of the topmost Via, e.g. `10.0.0.1` from `SIP/2.0/UDP 10.0.0.1:5072;branch=z9hG4bK1`
    pub fn via_host(&self) -> Option<String> {
        let via = self.header("Via")?;
        // A folded header may list several hops; the first is the sender.
        let top = via.split(',').next()?.trim();
        let sent_by = top.split_whitespace().nth(1)?;
        let sent_by = sent_by.split(';').next()?;

        let host = if let Some(rest) = sent_by.strip_prefix('[') {
            rest.split(']').next()?
        } else {
            sent_by.split(':').next()?
        };
        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }
}

/// A contact offered in a redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEntry {
    pub uri: SipUri,
    pub q: Option<QValue>,
}

impl fmt::Display for ContactEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.uri)?;
        if let Some(q) = self.q {
            write!(f, ";q={}", q)?;
        }
        Ok(())
    }
}

/// A response to a [`SipRequest`]
#[derive(Debug, Clone, PartialEq)]
pub struct SipResponse {
    pub status: StatusCode,
    pub headers: Vec<Header>,
    pub contacts: Vec<ContactEntry>,
}

const COPIED_HEADERS: [&str; 5] = ["Via", "From", "To", "Call-ID", "CSeq"];

impl SipResponse {
    /// Start a response carrying the request's dialog identifying headers
    ///
    /// Every Via is copied in order. Non-100 responses get a `tag` on `To` if
    /// the request did not already carry one.
    pub fn from_request(request: &SipRequest, status: impl Into<StatusCode>) -> Self {
        let status = status.into();
        let mut headers = Vec::new();
        for name in COPIED_HEADERS {
            for value in request.header_values(name) {
                let value = if name == "To" && status != StatusCode::TRYING && !has_tag(value) {
                    format!("{};tag={}", value, new_tag())
                } else {
                    value.to_string()
                };
                headers.push(Header::new(name, value));
            }
        }

        Self {
            status,
            headers,
            contacts: Vec::new(),
        }
    }

    pub fn add_contact(&mut self, uri: SipUri, q: Option<QValue>) {
        self.contacts.push(ContactEntry { uri, q });
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| header_matches(&h.name, name))
            .map(|h| h.value.as_str())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn has_tag(value: &str) -> bool {
    // Only parameters after the closing bracket belong to the header itself
    let params = match value.rfind('>') {
        Some(idx) => &value[idx..],
        None => value,
    };
    params
        .split(';')
        .skip(1)
        .any(|p| p.trim().to_ascii_lowercase().starts_with("tag="))
}

fn new_tag() -> String {
    let mut tag = Uuid::new_v4().simple().to_string();
    tag.truncate(10);
    tag
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn invite() -> SipRequest {
        SipRequest::new(Method::Invite, "sip:4165551234@10.0.0.1".parse().unwrap())
            .with_header("Via", "SIP/2.0/UDP 192.0.2.7:49152;branch=z9hG4bK776")
            .with_header("v", "SIP/2.0/UDP 192.0.2.1:5060;branch=z9hG4bK123")
            .with_header("From", "<sip:6135550000@192.0.2.7>;tag=abc")
            .with_header("To", "<sip:4165551234@10.0.0.1>")
            .with_header("i", "call-1@192.0.2.7")
            .with_header("CSeq", "1 INVITE")
            .with_header("Max-Forwards", "70")
    }

    #[test]
    fn test_header_lookup_is_case_insensitive_and_compact() {
        let req = invite();
        assert_eq!(req.header("call-id"), Some("call-1@192.0.2.7"));
        assert_eq!(req.header("CSEQ"), Some("1 INVITE"));
        assert_eq!(req.header_values("Via").count(), 2);
        assert_eq!(req.header("P-Charge-Info"), None);
    }

    #[test]
    fn test_via_host() {
        assert_eq!(invite().via_host().as_deref(), Some("192.0.2.7"));

        let v6 = SipRequest::new(Method::Options, SipUri::sip("h"))
            .with_header("Via", "SIP/2.0/UDP [2001:db8::9]:5060;branch=z9hG4bK1");
        assert_eq!(v6.via_host().as_deref(), Some("2001:db8::9"));

        let none = SipRequest::new(Method::Options, SipUri::sip("h"));
        assert_eq!(none.via_host(), None);
    }

    #[test]
    fn test_response_copies_dialog_headers() {
        let resp = SipResponse::from_request(&invite(), StatusCode::MOVED_TEMPORARILY);
        let names: Vec<_> = resp.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Via", "Via", "From", "To", "Call-ID", "CSeq"]);
        assert!(resp.header("To").unwrap().contains(";tag="));
        assert_eq!(resp.header("Max-Forwards"), None);
    }

    #[test]
    fn test_trying_has_no_to_tag() {
        let resp = SipResponse::from_request(&invite(), StatusCode::TRYING);
        assert_eq!(resp.header("To"), Some("<sip:4165551234@10.0.0.1>"));
    }

    #[test]
    fn test_existing_to_tag_kept() {
        let req = SipRequest::new(Method::Bye, SipUri::sip("h"))
            .with_header("To", "<sip:a@h>;tag=xyz");
        let resp = SipResponse::from_request(&req, StatusCode::OK);
        assert_eq!(resp.header("To"), Some("<sip:a@h>;tag=xyz"));
    }

    #[test]
    fn test_contact_rendering() {
        let contact = ContactEntry {
            uri: SipUri::sip("10.1.1.1").with_user("14165551234").with_port(5060),
            q: Some(QValue::from_tenths(9)),
        };
        assert_eq!(contact.to_string(), "<sip:14165551234@10.1.1.1:5060>;q=0.9");
        assert_eq!(QValue::MAX.to_string(), "1.0");
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(StatusCode::MOVED_TEMPORARILY.reason_phrase(), "Moved Temporarily");
        assert_eq!(StatusCode(399).reason_phrase(), "Redirection");
        assert_eq!(StatusCode::SERVICE_UNAVAILABLE.to_string(), "503 Service Unavailable");
    }
}
