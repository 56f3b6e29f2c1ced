//! Routing configuration
//!
//! Values only; loading them from disk is the server's job.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LcrError, Result};

/// Call-control platform the redirect responses are shaped for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    Generic,
    Metaswitch,
    Broadworks,
    M6,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Generic => "GENERIC",
            Platform::Metaswitch => "METASWITCH",
            Platform::Broadworks => "BROADWORKS",
            Platform::M6 => "M6",
        };
        f.write_str(name)
    }
}

/// Sizing and expiry of the four routing caches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries held by each cache
    pub max_capacity: u64,
    pub carrier_ttl_secs: u64,
    pub route_ttl_secs: u64,
    pub override_ttl_secs: u64,
    pub blacklist_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 20_000,
            carrier_ttl_secs: 60 * 60,
            route_ttl_secs: 15 * 60,
            override_ttl_secs: 15 * 60,
            blacklist_ttl_secs: 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn carrier_ttl(&self) -> Duration {
        Duration::from_secs(self.carrier_ttl_secs)
    }

    pub fn route_ttl(&self) -> Duration {
        Duration::from_secs(self.route_ttl_secs)
    }

    pub fn override_ttl(&self) -> Duration {
        Duration::from_secs(self.override_ttl_secs)
    }

    pub fn blacklist_ttl(&self) -> Duration {
        Duration::from_secs(self.blacklist_ttl_secs)
    }
}

/// Configuration of the routing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LcrConfig {
    pub platform: Platform,
    /// ISO 3166 region used to parse numbers without a country code
    pub default_region: String,
    /// Final status of a successful INVITE redirect
    pub success_status: u16,
    /// Status answered when the dialed number cannot be parsed
    pub error_status: u16,
    /// When false the route catalog is flushed before every lookup
    pub cache_enabled: bool,
    /// Send 100 Trying before the final INVITE response (Metaswitch)
    pub send_provisional: bool,
    /// Header carrying the billing identity for overrides and blacklists
    pub charge_info_header: String,
    /// Number of requests processed concurrently
    pub worker_pool_size: usize,
    pub cache: CacheConfig,
}

impl Default for LcrConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Metaswitch,
            default_region: "CA".to_string(),
            success_status: 302,
            error_status: 404,
            cache_enabled: true,
            send_provisional: false,
            charge_info_header: "P-Charge-Info".to_string(),
            worker_pool_size: 100,
            cache: CacheConfig::default(),
        }
    }
}

impl LcrConfig {
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Reject values the engine cannot operate with
    pub fn validate(&self) -> Result<()> {
        for (name, code) in [("success_status", self.success_status), ("error_status", self.error_status)] {
            if !(100..=699).contains(&code) {
                return Err(LcrError::Config(format!("{} must be a SIP status code, got {}", name, code)));
            }
        }
        if !(200..=699).contains(&self.success_status) {
            return Err(LcrError::Config(format!(
                "success_status must be a final response, got {}",
                self.success_status
            )));
        }
        if self.worker_pool_size == 0 {
            return Err(LcrError::Config("worker_pool_size must be at least 1".to_string()));
        }
        if self.cache.max_capacity == 0 {
            return Err(LcrError::Config("cache.max_capacity must be at least 1".to_string()));
        }
        if self.charge_info_header.trim().is_empty() {
            return Err(LcrError::Config("charge_info_header must not be empty".to_string()));
        }
        Ok(())
    }
}
