//! Simple Moving Average over closes, and the same window over volume.
//!
//! SMA[i] = mean(x[i-n+1..=i]). Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::simple_series;
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    simple_series(bars, IndicatorType::Sma(period), rolling_mean(&closes, period))
}

/// Rolling average volume, used by the volume-surge entry filter.
pub fn calculate_volume_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    simple_series(
        bars,
        IndicatorType::VolumeSma(period),
        rolling_mean(&volumes, period),
    )
}

fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    // Summing each window directly keeps every output independent of
    // accumulated rounding from earlier bars.
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                let window = &values[i + 1 - period..=i];
                Some(window.iter().sum::<f64>() / period as f64)
            }
        })
        .collect()
}
