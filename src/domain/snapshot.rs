//! Per-bar indicator snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::indicator::{
    calculate_adx, calculate_atr, calculate_macd, calculate_rsi, calculate_sma,
    calculate_volume_sma,
};
use crate::domain::ohlcv::Bar;
use crate::domain::strategy::StrategyConfig;

/// Indicator values for one bar. `None` means the indicator is still warming up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub volume: f64,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub atr: Option<f64>,
    pub adx: Option<f64>,
    pub volume_avg: Option<f64>,
}

/// Compute one snapshot per bar.
///
/// All indicators are causal, so snapshot `i` is exactly what a bar-by-bar
/// recomputation over `bars[..=i]` would produce.
pub fn compute_snapshots(bars: &[Bar], config: &StrategyConfig) -> Vec<IndicatorSnapshot> {
    let rsi = calculate_rsi(bars, config.rsi_window);
    let macd = calculate_macd(bars, config.macd_fast, config.macd_slow, config.macd_signal);
    let sma_fast = calculate_sma(bars, config.sma_fast_window);
    let sma_slow = calculate_sma(bars, config.sma_slow_window);
    let atr = calculate_atr(bars, config.atr_window);
    let adx = calculate_adx(bars, config.adx_window);
    let volume_avg = calculate_volume_sma(bars, config.volume_window);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let macd_values = macd.macd_at(i);
            IndicatorSnapshot {
                timestamp: bar.timestamp,
                close: bar.close,
                volume: bar.volume,
                rsi: rsi.value_at(i),
                macd_line: macd_values.map(|(line, _, _)| line),
                macd_signal: macd_values.map(|(_, signal, _)| signal),
                macd_histogram: macd_values.map(|(_, _, histogram)| histogram),
                sma_fast: sma_fast.value_at(i),
                sma_slow: sma_slow.value_at(i),
                atr: atr.value_at(i),
                adx: adx.value_at(i),
                volume_avg: volume_avg.value_at(i),
            }
        })
        .collect()
}
