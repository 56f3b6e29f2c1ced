//! Server configuration file
//!
//! ```toml
//! [sip]
//! address = "0.0.0.0"
//! port = 5060
//!
//! [database]
//! server = "127.0.0.1:3306"
//! database = "openlcr"
//! user = "lcr"
//! password = "secret"
//!
//! [logging]
//! level = "info"
//! log_dir = "/var/log/lcr"
//!
//! [admin]
//! listen = "127.0.0.1:8080"
//!
//! [routing]
//! platform = "METASWITCH"
//! send_provisional = true
//! ```
//!
//! Every table is optional except `[database]`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;
use thiserror::Error;

use lcr_core::LcrConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// SIP listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SipConfig {
    pub address: String,
    pub port: u16,
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: lcr_core::sip::DEFAULT_SIP_PORT,
        }
    }
}

impl SipConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.address, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("sip listen address {}:{}: {}", self.address, self.port, e)))
    }
}

/// MySQL/MariaDB connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `host[:port]`
    pub server: String,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    50
}

const DEFAULT_MYSQL_PORT: u16 = 3306;

impl DatabaseConfig {
    /// Split `server` into host and port, `[v6]:port` included
    pub fn host_port(&self) -> Result<(String, u16), ConfigError> {
        let server = self.server.trim();
        let invalid = || ConfigError::Invalid(format!("database server '{}'", self.server));

        let (host, port) = if let Some(rest) = server.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            (host, tail.strip_prefix(':'))
        } else {
            match server.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (server, None),
            }
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| invalid())?,
            None => DEFAULT_MYSQL_PORT,
        };
        Ok((host.to_string(), port))
    }

    /// Connection options; credentials are passed through verbatim
    pub fn connect_options(&self) -> Result<MySqlConnectOptions, ConfigError> {
        let (host, port) = self.host_port()?;
        let mut options = MySqlConnectOptions::new()
            .host(&host)
            .port(port)
            .username(&self.user)
            .database(&self.database);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
    pub file_info: bool,
    pub log_spans: bool,
    /// Directory for the daily rolling log file; console only when unset
    pub log_dir: Option<PathBuf>,
    pub log_file_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            log_spans: false,
            log_dir: None,
            log_file_name: "lcr-server.log".to_string(),
        }
    }
}

/// HTTP admin interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,
    pub listen: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AdminConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("admin listen address {}: {}", self.listen, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub sip: SipConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub routing: LcrConfig,
}

impl ServerConfig {
    /// Read and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ServerConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.routing
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.sip.socket_addr()?;
        self.database.host_port()?;
        if self.admin.enabled {
            self.admin.socket_addr()?;
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be at least 1".to_string()));
        }
        Ok(())
    }
}
