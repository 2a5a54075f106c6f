//! ATR (Average True Range) indicator.
//!
//! TR = max(H - L, |H - prev C|, |L - prev C|); the first bar uses H - L.
//! First ATR = mean of the first n TRs, then ATR = (prev * (n-1) + TR) / n.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{simple_series, true_ranges, wilder_smooth};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let tr: Vec<Option<f64>> = true_ranges(bars).into_iter().map(Some).collect();
    simple_series(bars, IndicatorType::Atr(period), wilder_smooth(&tr, period))
}
