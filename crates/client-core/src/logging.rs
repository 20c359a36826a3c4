//! Logging setup for applications built on the client

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ClientError, ClientResult};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to enable JSON formatting
    pub json: bool,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Whether to log spans
    pub log_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            log_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level) -> Self {
        LoggingConfig {
            level,
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Enable span logging
    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` directives are honoured on top of the configured level. Fails
/// if a subscriber is already installed.
pub fn setup_logging(config: LoggingConfig) -> ClientResult<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let result = if config.json {
        subscriber.with_writer(std::io::stdout).json().try_init()
    } else {
        subscriber.try_init()
    };

    result.map_err(|e| ClientError::invalid_configuration("logging", e.to_string()))
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> ClientResult<Level> {
    Level::from_str(level)
        .map_err(|_| ClientError::invalid_configuration("log_level", format!("unknown level '{}'", level)))
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
    fn test_builder_flags() {
        let config = LoggingConfig::new(Level::TRACE).with_file_info().with_spans();
        assert_eq!(config.level, Level::TRACE);
        assert!(config.file_info);
        assert!(config.log_spans);
        assert!(!config.json);
    }

    #[test]
    fn test_second_setup_fails_cleanly() {
        let _ = setup_logging(LoggingConfig::new(Level::DEBUG));
        assert!(setup_logging(LoggingConfig::default().with_json()).is_err());
    }
}
