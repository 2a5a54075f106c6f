//! Domain error types.

use chrono::{DateTime, Utc};

/// Top-level error type for papertrader.
#[derive(Debug, thiserror::Error)]
pub enum PapertraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("unknown config key [{section}] {key}")]
    ConfigUnknownKey { section: String, key: String },

    #[error("unknown config section [{section}]")]
    ConfigUnknownSection { section: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: String },

    #[error("non-monotonic timestamp at index {index}: {current} does not follow {previous}")]
    NonMonotonicTimestamp {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("order submission rejected: {reason}")]
    Execution { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PapertraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        PapertraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error family.
    pub fn exit_status(&self) -> u8 {
        match self {
            PapertraderError::Io(_) => 1,
            PapertraderError::ConfigParse { .. }
            | PapertraderError::ConfigUnknownKey { .. }
            | PapertraderError::ConfigUnknownSection { .. }
            | PapertraderError::ConfigInvalid { .. } => 2,
            PapertraderError::InvalidBar { .. }
            | PapertraderError::NonMonotonicTimestamp { .. }
            | PapertraderError::NoData { .. }
            | PapertraderError::Data { .. } => 5,
            PapertraderError::Execution { .. } => 6,
            PapertraderError::Report { .. } => 7,
        }
    }
}

impl From<&PapertraderError> for std::process::ExitCode {
    fn from(err: &PapertraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
