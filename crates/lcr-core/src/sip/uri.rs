//! Request-target URIs
//!
//! A deliberately small take on the RFC 3261 URI: enough structure to read the
//! dialed user part, overwrite routing parameters such as `dtg`, and point a
//! contact at a trunk group's host and port.
//!
//! ```text
//! sip:user@host:port;param=value;flag?headers
//! tel:+14165551234;phone-context=example.com
//! ```
//!
//! The user part is everything before the `@`, including any `;cic=` style
//! parameters some switches append to the dialed number.

use std::fmt;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_till1, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize, rest},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{LcrError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Sip,
    Sips,
    Tel,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
            Scheme::Tel => "tel",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `;name[=value]` URI parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UriParam {
    pub name: String,
    pub value: Option<String>,
}

impl fmt::Display for UriParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, ";{}={}", self.name, value),
            None => write!(f, ";{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SipUri {
    pub scheme: Scheme,
    pub user: Option<String>,
    /// Empty for `tel:` URIs
    pub host: String,
    pub port: Option<u16>,
    pub params: Vec<UriParam>,
    /// Raw `?` header component, without the question mark
    pub headers: Option<String>,
}

impl SipUri {
    /// A `sip:` URI for a host with no user or parameters
    pub fn sip(host: impl Into<String>) -> Self {
        Self {
            scheme: Scheme::Sip,
            user: None,
            host: host.into(),
            port: None,
            params: Vec::new(),
            headers: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.set_param(name, value);
        self
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Value of a parameter; `Some(None)` for a flag parameter
    pub fn param(&self, name: &str) -> Option<Option<&str>> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_deref())
    }

    /// Overwrite a parameter in place, or append it when absent
    pub fn set_param(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.params.iter_mut().find(|p| p.name.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.value = value,
            None => self.params.push(UriParam { name, value }),
        }
    }
}

impl fmt::Display for SipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        match self.scheme {
            Scheme::Tel => {
                if let Some(user) = &self.user {
                    f.write_str(user)?;
                }
            }
            Scheme::Sip | Scheme::Sips => {
                if let Some(user) = &self.user {
                    write!(f, "{}@", user)?;
                }
                f.write_str(&self.host)?;
                if let Some(port) = self.port {
                    write!(f, ":{}", port)?;
                }
            }
        }
        for param in &self.params {
            write!(f, "{}", param)?;
        }
        if let Some(headers) = &self.headers {
            write!(f, "?{}", headers)?;
        }
        Ok(())
    }
}

impl FromStr for SipUri {
    type Err = LcrError;

    fn from_str(s: &str) -> Result<Self> {
        parse_uri(s.trim())
            .map(|(_, uri)| uri)
            .map_err(|e| LcrError::unparseable(s, format!("invalid URI: {}", e)))
    }
}

fn scheme(input: &str) -> IResult<&str, Scheme> {
    terminated(
        alt((
            map(tag_no_case("sips"), |_| Scheme::Sips),
            map(tag_no_case("sip"), |_| Scheme::Sip),
            map(tag_no_case("tel"), |_| Scheme::Tel),
        )),
        char(':'),
    )(input)
}

fn userinfo(input: &str) -> IResult<&str, &str> {
    terminated(take_till1(|c| c == '@'), char('@'))(input)
}

fn host(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('['), take_while1(|c| c != ']'), char(']'))),
        take_while1(|c: char| !matches!(c, ':' | ';' | '?' | '>' | ' ')),
    ))(input)
}

fn port(input: &str) -> IResult<&str, u16> {
    preceded(char(':'), map_res(digit1, u16::from_str))(input)
}

fn param(input: &str) -> IResult<&str, UriParam> {
    map(
        preceded(
            char(';'),
            pair(
                take_while1(|c: char| !matches!(c, ';' | '=' | '?')),
                opt(preceded(char('='), take_while(|c: char| !matches!(c, ';' | '?')))),
            ),
        ),
        |(name, value): (&str, Option<&str>)| UriParam {
            name: name.to_string(),
            value: value.map(str::to_string),
        },
    )(input)
}

fn header_component(input: &str) -> IResult<&str, &str> {
    preceded(char('?'), rest)(input)
}

fn sip_uri(scheme: Scheme, input: &str) -> IResult<&str, SipUri> {
    let (input, (user, host, port, params, headers)) = tuple((
        opt(userinfo),
        host,
        opt(port),
        many0(param),
        opt(header_component),
    ))(input)?;

    Ok((
        input,
        SipUri {
            scheme,
            user: user.map(str::to_string),
            host: host.to_string(),
            port,
            params,
            headers: headers.map(str::to_string),
        },
    ))
}

fn tel_uri(input: &str) -> IResult<&str, SipUri> {
    let (input, (number, params)) =
        pair(take_while1(|c: char| !matches!(c, ';' | '?')), many0(param))(input)?;

    Ok((
        input,
        SipUri {
            scheme: Scheme::Tel,
            user: Some(number.to_string()),
            host: String::new(),
            port: None,
            params,
            headers: None,
        },
    ))
}

/// Parse a complete URI, rejecting trailing input
pub fn parse_uri(input: &str) -> IResult<&str, SipUri> {
    all_consuming(|input| {
        let (input, scheme) = scheme(input)?;
        match scheme {
            Scheme::Tel => tel_uri(input),
            Scheme::Sip | Scheme::Sips => sip_uri(scheme, input),
        }
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_uri() {
        let uri: SipUri = "sip:4165551234@10.0.0.5:5070;transport=udp;lr".parse().unwrap();
        assert_eq!(uri.scheme, Scheme::Sip);
        assert_eq!(uri.user(), Some("4165551234"));
        assert_eq!(uri.host, "10.0.0.5");
        assert_eq!(uri.port, Some(5070));
        assert_eq!(uri.param("transport"), Some(Some("udp")));
        assert_eq!(uri.param("lr"), Some(None));
        assert_eq!(uri.param("dtg"), None);
    }

    #[test]
    fn test_user_keeps_cic_parameters() {
        let uri: SipUri = "sip:+14169671111;cic=0001;dai=presub@switch.example.com;user=phone"
            .parse()
            .unwrap();
        assert_eq!(uri.user(), Some("+14169671111;cic=0001;dai=presub"));
        assert_eq!(uri.host, "switch.example.com");
        assert_eq!(uri.param("user"), Some(Some("phone")));
    }

    #[test]
    fn test_set_param_overwrites() {
        let mut uri: SipUri = "sip:4165551234@meta.example.com;dtg=OLD;user=phone".parse().unwrap();
        uri.set_param("dtg", Some("TG7".to_string()));
        assert_eq!(uri.to_string(), "sip:4165551234@meta.example.com;dtg=TG7;user=phone");

        uri.set_param("otg", Some("IN1".to_string()));
        assert_eq!(uri.to_string(), "sip:4165551234@meta.example.com;dtg=TG7;user=phone;otg=IN1");
    }

    #[test]
    fn test_display_built_uri() {
        let uri = SipUri::sip("192.0.2.10").with_user("14165551234").with_port(5060);
        assert_eq!(uri.to_string(), "sip:14165551234@192.0.2.10:5060");
    }

    #[test]
    fn test_parse_tel_and_ipv6() {
        let tel: SipUri = "tel:+14165551234;phone-context=example.com".parse().unwrap();
        assert_eq!(tel.user(), Some("+14165551234"));
        assert_eq!(tel.to_string(), "tel:+14165551234;phone-context=example.com");

        let v6: SipUri = "sip:alice@[2001:db8::1]:5061".parse().unwrap();
        assert_eq!(v6.host, "[2001:db8::1]");
        assert_eq!(v6.port, Some(5061));
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!("http://example.com".parse::<SipUri>().is_err());
        assert!("sip:".parse::<SipUri>().is_err());
    }
}
