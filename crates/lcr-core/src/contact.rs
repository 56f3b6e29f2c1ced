//! Lenient parsing of name-addr style header values
//!
//! Used to pull the billing number out of charging-identity headers, which in
//! the field arrive in every shape from `"Name" <sip:user@host>` down to a bare
//! digit string. Parsing never fails: input that matches none of the grammars
//! is taken as a bare user part.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

const SCHEME_RULE: &str = "sips?|tel";

/// `["display"] [<]scheme:user@domain[>]`
static CONTACT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^(?:")?([^<"]*)(?:")?[ ]*(?:<)?({}):([^@]+)@([^>]+)(?:>)?$"#,
        SCHEME_RULE
    ))
    .expect("contact pattern is valid")
});

/// `["display"] [<]scheme:domain[>]`
static HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"^(?:")?([^<"]*)(?:")?[ ]*(?:<)?({}):([^@>]+)(?:>)?$"#,
        SCHEME_RULE
    ))
    .expect("host pattern is valid")
});

/// `user@domain`
static ADDRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^@:]+)@([^@]+)$").expect("address pattern is valid"));

/// Components extracted from a header value; absent parts are empty strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactInfo {
    pub display_name: String,
    pub scheme: String,
    pub user_part: String,
    pub domain: String,
}

/// Parse a header value against the contact, host-only and bare address grammars
pub fn parse_contact(value: &str) -> ContactInfo {
    if value.is_empty() {
        return ContactInfo::default();
    }

    if let Some(caps) = CONTACT_PATTERN.captures(value) {
        return ContactInfo {
            display_name: decode(caps[1].trim()),
            scheme: caps[2].to_string(),
            user_part: decode(&caps[3]),
            domain: caps[4].to_string(),
        };
    }

    if let Some(caps) = HOST_PATTERN.captures(value) {
        return ContactInfo {
            display_name: decode(caps[1].trim()),
            scheme: caps[2].to_string(),
            user_part: String::new(),
            domain: caps[3].to_string(),
        };
    }

    if let Some(caps) = ADDRESS_PATTERN.captures(value) {
        return ContactInfo {
            user_part: decode(&caps[1]),
            domain: caps[2].to_string(),
            ..Default::default()
        };
    }

    ContactInfo {
        user_part: value.to_string(),
        ..Default::default()
    }
}

/// Form-style decoding: `+` is a space, `%HH` an escaped byte
fn decode(s: &str) -> String {
    let spaced: Cow<'_, str> = if s.contains('+') {
        Cow::Owned(s.replace('+', " "))
    } else {
        Cow::Borrowed(s)
    };
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
