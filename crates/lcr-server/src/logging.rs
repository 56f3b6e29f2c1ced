use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogConfig;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json: bool,
    /// Include file and line information
    pub file_info: bool,
    pub log_spans: bool,
    /// Daily rolling file written alongside the console
    pub file: Option<(PathBuf, String)>,
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
            file: None,
            app_name: "lcr-server".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    pub fn with_daily_file(mut self, dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        self.file = Some((dir.into(), file_name.into()));
        self
    }

    /// Build from the `[logging]` table, letting `level_override` win over the file
    pub fn from_file_config(config: &LogConfig, level_override: Option<&str>) -> Result<Self> {
        let level = parse_log_level(level_override.unwrap_or(&config.level))?;
        let mut logging = LoggingConfig::new(level, "lcr-server");
        if config.json {
            logging = logging.with_json();
        }
        if config.file_info {
            logging = logging.with_file_info();
        }
        if config.log_spans {
            logging = logging.with_spans();
        }
        if let Some(dir) = &config.log_dir {
            logging = logging.with_daily_file(dir, config.log_file_name.clone());
        }
        Ok(logging)
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the process.
pub fn setup_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let (writer, guard) = match &config.file {
        Some((dir, file_name)) => {
            let appender = tracing_appender::rolling::daily(dir, file_name);
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(std::io::stdout.and(file_writer)), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .with_writer(writer);

    let installed = if config.json {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))?;

    Ok(guard)
}

pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| anyhow!("Invalid log level: {}", level))
}

/// Log a welcome message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_cli_level_wins() {
        let file = LogConfig {
            level: "info".to_string(),
            log_dir: Some(PathBuf::from("/tmp/lcr")),
            ..LogConfig::default()
        };
        let config = LoggingConfig::from_file_config(&file, Some("trace")).unwrap();
        assert_eq!(config.level, Level::TRACE);
        assert_eq!(config.app_name, "lcr-server");
        assert_eq!(
            config.file,
            Some((PathBuf::from("/tmp/lcr"), "lcr-server.log".to_string()))
        );
    }
}
