//! OHLCV bar representation and boundary validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PapertraderError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Check the single-bar invariants: finite positive prices, a high/low
    /// envelope around open and close, and a non-negative volume.
    pub fn validate(&self, index: usize) -> Result<(), PapertraderError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(PapertraderError::InvalidBar {
                    index,
                    reason: format!("{name} must be a finite positive price, got {value}"),
                });
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(PapertraderError::InvalidBar {
                index,
                reason: format!("volume must be finite and non-negative, got {}", self.volume),
            });
        }
        if self.high < self.open.max(self.close) {
            return Err(PapertraderError::InvalidBar {
                index,
                reason: format!("high {} is below max(open, close)", self.high),
            });
        }
        if self.low > self.open.min(self.close) {
            return Err(PapertraderError::InvalidBar {
                index,
                reason: format!("low {} is above min(open, close)", self.low),
            });
        }
        Ok(())
    }
}

/// Validate a whole series before any state is touched.
///
/// Every bar must satisfy [`Bar::validate`] and timestamps must be strictly
/// increasing. The first offending bar fails the entire series.
pub fn validate_bars(bars: &[Bar]) -> Result<(), PapertraderError> {
    for (index, bar) in bars.iter().enumerate() {
        bar.validate(index)?;
        if index > 0 {
            let previous = bars[index - 1].timestamp;
            if bar.timestamp <= previous {
                return Err(PapertraderError::NonMonotonicTimestamp {
                    index,
                    previous,
                    current: bar.timestamp,
                });
            }
        }
    }
    Ok(())
}

/// Parse a bar timestamp.
///
/// Accepted forms: RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` (midnight UTC)
/// and integer epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}
