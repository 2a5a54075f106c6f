//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values, one point per input bar
//!
//! Every calculation is causal: the point at index `i` only reads bars `0..=i`.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use adx::calculate_adx;
pub use atr::calculate_atr;
pub use ema::calculate_ema;
pub use macd::{calculate_macd, calculate_macd_default};
pub use rsi::calculate_rsi;
pub use sma::{calculate_sma, calculate_volume_sma};

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    VolumeSma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Simple value at `index`, or `None` while warming up.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    /// MACD triple (line, signal, histogram) at `index`, or `None` while warming up.
    pub fn macd_at(&self, index: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value:
                    IndicatorValue::Macd {
                        line,
                        signal,
                        histogram,
                    },
                ..
            }) => Some((*line, *signal, *histogram)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}
