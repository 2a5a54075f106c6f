//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n price changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are invalid (need n price changes to compute initial average).

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{simple_series, wilder_smooth};
use crate::domain::ohlcv::Bar;

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut gains: Vec<Option<f64>> = Vec::with_capacity(bars.len());
    let mut losses: Vec<Option<f64>> = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            gains.push(None);
            losses.push(None);
            continue;
        }
        let change = bar.close - bars[i - 1].close;
        gains.push(Some(change.max(0.0)));
        losses.push(Some((-change).max(0.0)));
    }

    let avg_gains = wilder_smooth(&gains, period);
    let avg_losses = wilder_smooth(&losses, period);

    let values = avg_gains
        .iter()
        .zip(&avg_losses)
        .map(|(gain, loss)| match (gain, loss) {
            (Some(g), Some(l)) => Some(rsi_from_averages(*g, *l)),
            _ => None,
        })
        .collect();

    simple_series(bars, IndicatorType::Rsi(period), values)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rsi = 100.0 - (100.0 / (1.0 + avg_gain / avg_loss));
    rsi.clamp(0.0, 100.0)
}
