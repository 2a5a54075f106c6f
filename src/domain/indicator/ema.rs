//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::simple_series;
use crate::domain::ohlcv::Bar;

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    simple_series(bars, IndicatorType::Ema(period), ema_values(&closes, period))
}

/// EMA over an arbitrary value slice; shared with the MACD signal line.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i < period - 1 {
            sum += value;
            out.push(None);
        } else if i == period - 1 {
            sum += value;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = value * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }

    out
}
