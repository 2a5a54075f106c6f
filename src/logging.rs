//! Logging configuration and initialization.
//!
//! Only the binary installs a subscriber. Library code emits `tracing` events
//! and leaves the decision of where they go to the caller.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::domain::error::PapertraderError;
use crate::ports::config_port::ConfigPort;

pub const SECTION: &str = "logging";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human-readable.
    #[default]
    Pretty,
    /// Single line per event.
    Compact,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format {other:?}, expected pretty or compact")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `papertrader=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Read the `[logging]` section, falling back to defaults for missing keys.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let mut log = LogConfig::default();
        if let Some(level) = config.get_string(SECTION, "level") {
            let level = level.trim().to_string();
            EnvFilter::try_new(&level)
                .map_err(|e| PapertraderError::invalid(SECTION, "level", e.to_string()))?;
            log.level = level;
        }
        if let Some(format) = config.get_string(SECTION, "format") {
            log.format = format
                .parse()
                .map_err(|reason: String| PapertraderError::invalid(SECTION, "format", reason))?;
        }
        Ok(log)
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// `RUST_LOG` wins over the configured level.
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = tracing_subscriber::registry().with(config.env_filter());

    match config.format {
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true);
            registry.with(layer).try_init()?;
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false);
            registry.with(layer).try_init()?;
        }
    }

    Ok(())
}
