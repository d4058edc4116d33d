//! Logging setup for harness binaries and tests
//!
//! Observability configuration is process-wide: it is installed once at
//! startup and read-only afterwards. Engine internals only ever emit
//! through `tracing` macros and never touch the subscriber again.

use std::str::FromStr;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::errors::{SubscribeError, SubscribeResult};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// The log level to use
    pub level: Level,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Application name to include in the startup line
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            file_info: false,
            app_name: "sipdriver".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }
}

/// Set up the logging system with the provided configuration
///
/// Call once at startup. Later calls fail because the global subscriber
/// is already installed.
pub fn setup_logging(config: LoggingConfig) -> SubscribeResult<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    subscriber
        .try_init()
        .map_err(|e| SubscribeError::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!("Starting {} v{}", config.app_name, env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> SubscribeResult<Level> {
    Level::from_str(level)
        .map_err(|_| SubscribeError::Config(format!("Invalid log level: {}", level)))
}

static TEST_INIT: Once = Once::new();

/// Idempotent logging init for tests
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_for_tests() {
    TEST_INIT.call_once(|| {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
