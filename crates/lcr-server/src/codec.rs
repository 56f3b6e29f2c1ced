//! SIP datagram framing
//!
//! Only what the redirect server needs: requests are parsed into
//! [`SipRequest`] (the body is skipped), and responses are rendered without
//! a body.

use nom::{
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::{char, line_ending, not_line_ending, space0, space1},
    combinator::{map, opt},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

use lcr_core::sip::{Method, SipRequest, SipResponse, SipUri};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Datagram is not valid UTF-8")]
    NotUtf8,

    /// CRLF keep-alive ping
    #[error("Keep-alive")]
    KeepAlive,

    #[error("Received a response, not a request")]
    NotARequest,

    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Invalid request URI '{0}'")]
    InvalidUri(String),
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-.!%*_+`'~".contains(c)
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(is_token_char)(input)
}

/// `INVITE sip:4165551234@10.0.0.1 SIP/2.0`
fn request_line(input: &str) -> IResult<&str, (&str, &str)> {
    terminated(
        pair(
            terminated(token, char(' ')),
            terminated(take_till1(|c: char| c == ' ' || c == '\r' || c == '\n'), char(' ')),
        ),
        terminated(tag("SIP/2.0"), line_ending),
    )(input)
}

/// A header line plus any folded continuation lines
fn header(input: &str) -> IResult<&str, (String, String)> {
    map(
        tuple((
            terminated(token, delimited(space0, char(':'), space0)),
            terminated(not_line_ending, line_ending),
            many0(preceded(space1, terminated(not_line_ending, line_ending))),
        )),
        |(name, first, folded): (&str, &str, Vec<&str>)| {
            let mut value = first.trim_end().to_string();
            for line in folded {
                value.push(' ');
                value.push_str(line.trim());
            }
            (name.to_string(), value)
        },
    )(input)
}

fn message_head(input: &str) -> IResult<&str, ((&str, &str), Vec<(String, String)>)> {
    terminated(pair(request_line, many0(header)), opt(line_ending))(input)
}

/// Parse one datagram into a request
pub fn parse_request(data: &[u8]) -> Result<SipRequest, CodecError> {
    let text = std::str::from_utf8(data).map_err(|_| CodecError::NotUtf8)?;
    if text.trim().is_empty() {
        return Err(CodecError::KeepAlive);
    }
    if text.starts_with("SIP/2.0 ") {
        return Err(CodecError::NotARequest);
    }

    let (_body, ((method, uri), headers)) = message_head(text).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let uri: SipUri = uri.parse().map_err(|_| CodecError::InvalidUri(uri.to_string()))?;
    let method: Method = method
        .parse()
        .map_err(|_| CodecError::Malformed(format!("bad method {}", method)))?;

    let mut request = SipRequest::new(method, uri);
    for (name, value) in headers {
        request = request.with_header(name, value);
    }
    if request.call_id().is_none() {
        return Err(CodecError::Malformed("missing Call-ID".to_string()));
    }
    Ok(request)
}

/// Render a response; each contact gets its own `Contact` line
pub fn encode_response(response: &SipResponse) -> Vec<u8> {
    let mut out = format!("SIP/2.0 {}\r\n", response.status);
    for header in &response.headers {
        if header.name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        out.push_str(&format!("{}: {}\r\n", header.name, header.value));
    }
    for contact in &response.contacts {
        out.push_str(&format!("Contact: {}\r\n", contact));
    }
    out.push_str("Content-Length: 0\r\n\r\n");
    out.into_bytes()
}
