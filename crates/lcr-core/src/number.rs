//! Dialed and billing number normalization
//!
//! Parsing and validity checks are delegated to the `phonenumber` crate. This
//! module adds the routing specifics: CIC truncation, the digit strings used as
//! cache keys, carrier-facing formatting and prefix/suffix modifications.

use std::fmt;

use phonenumber::country;
use tracing::{debug, warn};

use crate::error::{LcrError, Result};
use crate::model::{Carrier, Route, RouteModification};

/// A validated telephone number
#[derive(Debug, Clone)]
pub struct PhoneNumber {
    country_code: u16,
    national_number: u64,
    /// User part the number was parsed from, after truncation at `;`
    dialed: String,
    inner: phonenumber::PhoneNumber,
}

impl PhoneNumber {
    pub fn country_code(&self) -> u16 {
        self.country_code
    }

    pub fn national_number(&self) -> u64 {
        self.national_number
    }

    /// Country code followed by the national number, the route catalog key
    pub fn routing_digits(&self) -> String {
        format!("{}{}", self.country_code, self.national_number)
    }

    /// National significant number, the override and blacklist key
    pub fn national_digits(&self) -> String {
        self.national_number.to_string()
    }

    /// The user part exactly as it was dialed
    pub fn dialed(&self) -> &str {
        &self.dialed
    }
}

impl PartialEq for PhoneNumber {
    fn eq(&self, other: &Self) -> bool {
        self.country_code == other.country_code && self.national_number == other.national_number
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}", self.routing_digits())
    }
}

/// Parses numbers for one default region and renders them for carriers
#[derive(Debug, Clone)]
pub struct NumberNormalizer {
    region: country::Id,
    region_code: String,
    region_calling_code: u16,
    international_prefix: String,
}

impl NumberNormalizer {
    /// Create a normalizer for an ISO 3166 region code such as `CA`
    pub fn new(region: &str) -> Result<Self> {
        let region_code = region.trim().to_ascii_uppercase();
        let id = region_code
            .parse::<country::Id>()
            .map_err(|_| LcrError::Config(format!("Unknown region '{}'", region)))?;
        let metadata = phonenumber::metadata::DATABASE
            .by_id(region_code.as_str())
            .ok_or_else(|| LcrError::Config(format!("No numbering metadata for region '{}'", region)))?;

        Ok(Self {
            region: id,
            region_code,
            region_calling_code: metadata.country_code(),
            international_prefix: dialing_prefix(metadata),
        })
    }

    pub fn region(&self) -> &str {
        &self.region_code
    }

    /// Parse and validate a raw user part
    ///
    /// Anything after the first `;` (CIC codes, `npdi`, ...) is ignored.
    pub fn parse(&self, raw: &str) -> Result<PhoneNumber> {
        let dialed = raw.split(';').next().unwrap_or_default().trim();
        if dialed.is_empty() {
            return Err(LcrError::unparseable(raw, "empty user part"));
        }

        let inner = phonenumber::parse(Some(self.region.clone()), dialed)
            .map_err(|e| LcrError::unparseable(raw, e))?;
        if !phonenumber::is_valid(&inner) {
            return Err(LcrError::unparseable(
                raw,
                format!("not a valid number for region {}", self.region_code),
            ));
        }

        Ok(PhoneNumber {
            country_code: inner.code().value(),
            national_number: inner.national().value(),
            dialed: dialed.to_string(),
            inner,
        })
    }

    /// Render a number the way a carrier expects to receive it
    pub fn format(&self, number: &PhoneNumber, carrier: &Carrier) -> String {
        if carrier.use_e164 {
            return number.dialed.clone();
        }

        let formatted = if number.country_code == self.region_calling_code {
            if self.region_calling_code == 1 {
                format!("1{}", number.national_number)
            } else {
                number
                    .inner
                    .format()
                    .mode(phonenumber::Mode::National)
                    .to_string()
            }
        } else {
            format!(
                "{}{}{}",
                self.international_prefix,
                number.country_code,
                number.inner.national()
            )
        };

        strip_separators(&formatted)
    }

    /// Apply a route's digit modification to an already formatted number
    pub fn apply_modification(formatted: &str, modification: &RouteModification) -> String {
        match modification {
            RouteModification::None => formatted.to_string(),
            RouteModification::Prepend(prefix) => format!("{}{}", prefix, formatted),
            RouteModification::Append(suffix) => format!("{}{}", formatted, suffix),
            RouteModification::Unsupported { kind, .. } => {
                warn!(kind = %kind, "Route modification kind not supported, number left unchanged");
                formatted.to_string()
            }
        }
    }

    /// Format for a carrier and apply the route's modification
    ///
    /// E.164 carriers receive the dialed number untouched; a modification on
    /// such a route is ignored.
    pub fn format_for_route(&self, number: &PhoneNumber, carrier: &Carrier, route: &Route) -> String {
        if carrier.use_e164 {
            if !route.modification.is_none() {
                warn!(
                    carrier_id = %carrier.id,
                    route_id = route.route_id,
                    "Carrier uses E.164 but route requests a modification, ignoring modification"
                );
            }
            return number.dialed.clone();
        }

        let formatted = self.format(number, carrier);
        let modified = Self::apply_modification(&formatted, &route.modification);
        if modified != formatted {
            debug!(route_id = route.route_id, from = %formatted, to = %modified, "Applied route modification");
        }
        modified
    }

    /// Prefix dialed from the home region to reach another country
    pub fn international_prefix(&self) -> &str {
        &self.international_prefix
    }
}

/// A single-valued international prefix wins, then the preferred one for
/// regions with several; otherwise fall back to `+`.
fn dialing_prefix(metadata: &phonenumber::metadata::Metadata) -> String {
    let unique = metadata
        .international_prefix()
        .map(|idd| idd.as_str())
        .filter(|idd| !idd.is_empty() && idd.chars().all(|c| c.is_ascii_digit()));
    unique
        .or_else(|| metadata.preferred_international_prefix())
        .unwrap_or("+")
        .to_string()
}

fn strip_separators(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}
