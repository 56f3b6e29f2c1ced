//! Datagram parsing and response rendering

use pretty_assertions::assert_eq;

use lcr_core::sip::{Method, QValue, SipResponse, SipUri, StatusCode};
use lcr_server::codec::{encode_response, parse_request, CodecError};

const INVITE: &str = "INVITE sip:4169671111@lcr.example.com;user=phone SIP/2.0\r\n\
Via: SIP/2.0/UDP 192.0.2.10:5060;branch=z9hG4bK-524287-1\r\n\
Max-Forwards: 70\r\n\
From: <sip:6132221234@192.0.2.10>;tag=abc\r\n\
To: <sip:4169671111@lcr.example.com>\r\n\
Call-ID: 7f3e9c@192.0.2.10\r\n\
CSeq: 1 INVITE\r\n\
P-Charge-Info: <sip:6132221234@192.0.2.10;npi=ISDN>\r\n\
Content-Type: application/sdp\r\n\
Content-Length: 4\r\n\
\r\n\
v=0\n";

#[test]
fn test_parse_invite() {
    let request = parse_request(INVITE.as_bytes()).unwrap();

    assert_eq!(request.method, Method::Invite);
    assert_eq!(request.uri.user(), Some("4169671111"));
    assert_eq!(request.uri.host, "lcr.example.com");
    assert_eq!(request.call_id(), Some("7f3e9c@192.0.2.10"));
    assert_eq!(request.header("p-charge-info"), Some("<sip:6132221234@192.0.2.10;npi=ISDN>"));
    assert_eq!(request.via_host().as_deref(), Some("192.0.2.10"));
    assert_eq!(request.headers.len(), 9);
}

#[test]
fn test_parse_compact_headers_and_bare_lf() {
    let raw = "OPTIONS sip:lcr.example.com SIP/2.0\n\
v: SIP/2.0/UDP [2001:db8::1]:5060;branch=z9hG4bK1\n\
i: ping-1\n\
\n";
    let request = parse_request(raw.as_bytes()).unwrap();
    assert_eq!(request.method, Method::Options);
    assert_eq!(request.call_id(), Some("ping-1"));
    assert_eq!(request.via_host().as_deref(), Some("2001:db8::1"));
}

#[test]
fn test_rejects_non_requests() {
    assert_eq!(
        parse_request(b"SIP/2.0 200 OK\r\nCall-ID: x\r\n\r\n"),
        Err(CodecError::NotARequest)
    );
    assert_eq!(parse_request(&[0xff, 0xfe]), Err(CodecError::NotUtf8));
    assert!(matches!(parse_request(b"garbage\r\n\r\n"), Err(CodecError::Malformed(_))));
    assert!(matches!(
        parse_request(b"INVITE sip:1@h SIP/2.0\r\nVia: x\r\n\r\n"),
        Err(CodecError::Malformed(_))
    ));
    assert!(matches!(
        parse_request(b"INVITE nonsense SIP/2.0\r\nCall-ID: x\r\n\r\n"),
        Err(CodecError::InvalidUri(_))
    ));
}

#[test]
fn test_encode_redirect() {
    let request = parse_request(INVITE.as_bytes()).unwrap();
    let mut response = SipResponse::from_request(&request, StatusCode::MOVED_TEMPORARILY);
    response.add_contact(SipUri::sip("10.0.0.1").with_user("14169671111").with_port(5060), Some(QValue::MAX));
    response.add_contact(SipUri::sip("10.0.0.2").with_user("14169671111"), Some(QValue::from_tenths(9)));

    let text = String::from_utf8(encode_response(&response)).unwrap();
    let lines: Vec<_> = text.split("\r\n").collect();

    assert_eq!(lines[0], "SIP/2.0 302 Moved Temporarily");
    assert_eq!(lines[1], "Via: SIP/2.0/UDP 192.0.2.10:5060;branch=z9hG4bK-524287-1");
    assert!(lines[3].starts_with("To: <sip:4169671111@lcr.example.com>;tag="));
    assert!(text.contains("Contact: <sip:14169671111@10.0.0.1:5060>;q=1.0\r\n"));
    assert!(text.contains("Contact: <sip:14169671111@10.0.0.2>;q=0.9\r\n"));
    assert!(text.ends_with("Content-Length: 0\r\n\r\n"));
}

#[test]
fn test_encode_error_has_no_contacts() {
    let request = parse_request(INVITE.as_bytes()).unwrap();
    let response = SipResponse::from_request(&request, StatusCode::SERVICE_UNAVAILABLE);
    let text = String::from_utf8(encode_response(&response)).unwrap();

    assert!(text.starts_with("SIP/2.0 503 Service Unavailable\r\n"));
    assert!(!text.contains("Contact:"));
    assert!(text.contains("CSeq: 1 INVITE\r\n"));
}
