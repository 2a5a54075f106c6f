//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: max(fast, slow) - 1 + signal - 1 bars (i.e., slow - 1 + signal - 1 for defaults)

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[Bar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };

    if fast == 0 || slow == 0 || signal_period == 0 {
        return invalid_series(bars, indicator_type);
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // The signal EMA runs over the defined part of the MACD line only.
    let macd_warmup = fast.max(slow) - 1;
    let mut signal_line = vec![None; bars.len()];
    if bars.len() > macd_warmup {
        let defined: Vec<f64> = macd_line[macd_warmup..].iter().flatten().copied().collect();
        for (offset, value) in ema_values(&defined, signal_period).into_iter().enumerate() {
            signal_line[macd_warmup + offset] = value;
        }
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (macd_line[i], signal_line[i]) {
            (Some(line), Some(signal)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            },
            _ => invalid_point(bar),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_macd_default(bars: &[Bar]) -> IndicatorSeries {
    calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

fn invalid_point(bar: &Bar) -> IndicatorPoint {
    IndicatorPoint {
        timestamp: bar.timestamp,
        valid: false,
        value: IndicatorValue::Macd {
            line: 0.0,
            signal: 0.0,
            histogram: 0.0,
        },
    }
}

fn invalid_series(bars: &[Bar], indicator_type: IndicatorType) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type,
        values: bars.iter().map(invalid_point).collect(),
    }
}
