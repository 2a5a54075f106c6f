//! Shared helper functions for indicator calculations.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Build a simple-valued series aligned to `bars` from optional values.
///
/// `None` becomes an invalid point whose stored value is 0.0; callers go
/// through [`IndicatorSeries::value_at`] and never see it.
pub fn simple_series(
    bars: &[Bar],
    indicator_type: IndicatorType,
    values: Vec<Option<f64>>,
) -> IndicatorSeries {
    let values = bars
        .iter()
        .zip(values)
        .map(|(bar, value)| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: value.is_some(),
            value: IndicatorValue::Simple(value.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

/// Wilder smoothing over an optional input series.
///
/// The first output is the plain mean of the first `period` consecutive
/// available inputs; after that `avg = (prev * (period - 1) + x) / period`.
/// A gap before seeding restarts the seed window. A gap after seeding yields
/// `None` for that index without touching the running average.
pub fn wilder_smooth(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;
    let mut avg: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        match (avg, value) {
            (None, Some(v)) => {
                seed_sum += v;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / period as f64;
                    avg = Some(seed);
                    out[i] = Some(seed);
                }
            }
            (None, None) => {
                seed_sum = 0.0;
                seed_count = 0;
            }
            (Some(prev), Some(v)) => {
                let next = (prev * (period - 1) as f64 + v) / period as f64;
                avg = Some(next);
                out[i] = Some(next);
            }
            (Some(_), None) => {}
        }
    }

    out
}

/// True range per bar. The first bar has no previous close and uses high - low.
pub fn true_ranges(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}
