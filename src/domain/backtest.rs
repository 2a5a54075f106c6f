//! Backtest driver.
//!
//! Replays a symbol's bars once, in order, through the signal generator and
//! the position state machine. Bad data fails the run before any state is
//! touched, and an open position is closed on the final bar so every run ends
//! flat.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::domain::config_validation::{
    parse_f64, validate_backtest_config, validate_strategy_config,
};
use crate::domain::engine::Engine;
use crate::domain::error::PapertraderError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::ohlcv::{Bar, validate_bars};
use crate::domain::portfolio::EquityPoint;
use crate::domain::snapshot::compute_snapshots;
use crate::domain::strategy::StrategyConfig;
use crate::domain::trade::{ClosedTrade, TradeEvent};
use crate::ports::config_port::ConfigPort;

pub const SECTION: &str = "backtest";

/// Keys accepted in the `[backtest]` section. The last three select data and
/// are read by the CLI, not by `BacktestConfig`.
pub const BACKTEST_KEYS: &[&str] = &[
    "initial_capital",
    "position_size",
    "commission_pct",
    "data_dir",
    "symbol",
    "symbols",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Share of available cash committed on each entry.
    pub position_size: f64,
    /// Commission per fill, in percent of notional.
    pub commission_pct: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 10_000.0,
            position_size: 1.0,
            commission_pct: 0.0,
        }
    }
}

impl BacktestConfig {
    /// Read the `[backtest]` section; missing keys keep their defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let mut backtest = BacktestConfig::default();
        let read = |key: &str| -> Result<Option<f64>, PapertraderError> {
            config
                .get_string(SECTION, key)
                .map(|value| parse_f64(SECTION, key, value.trim()))
                .transpose()
        };

        if let Some(v) = read("initial_capital")? {
            backtest.initial_capital = v;
        }
        if let Some(v) = read("position_size")? {
            backtest.position_size = v;
        }
        if let Some(v) = read("commission_pct")? {
            backtest.commission_pct = v;
        }

        validate_backtest_config(&backtest)?;
        Ok(backtest)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: String,
    pub initial_capital: f64,
    pub final_equity: f64,
    #[serde(flatten)]
    pub report: PerformanceReport,
    pub trades: Vec<TradeEvent>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Run one symbol's bars through the strategy.
pub fn run_backtest(
    symbol: &str,
    bars: &[Bar],
    strategy: &StrategyConfig,
    config: &BacktestConfig,
) -> Result<BacktestResult, PapertraderError> {
    validate_strategy_config(strategy)?;
    validate_backtest_config(config)?;
    let Some(last_bar) = bars.last() else {
        return Err(PapertraderError::NoData {
            symbol: symbol.to_string(),
        });
    };
    validate_bars(bars)?;

    info!(
        symbol,
        bars = bars.len(),
        warmup = strategy.warmup_bars(),
        strategy = %strategy.name,
        "backtest started"
    );

    let snapshots = compute_snapshots(bars, strategy);
    let mut engine = Engine::new(symbol, strategy.clone(), config);
    for (bar, snapshot) in bars.iter().zip(snapshots) {
        engine.on_bar(bar, snapshot);
    }
    engine.close_out(last_bar);

    let result = engine.into_result();
    info!(
        symbol,
        trades = result.trades.len(),
        total_return_pct = result.report.total_return_pct,
        win_rate = result.report.win_rate,
        "backtest finished"
    );
    Ok(result)
}

/// Run several symbols in parallel. Each run owns its own state; the first
/// failure fails the batch.
pub fn run_many(
    inputs: &[(String, Vec<Bar>)],
    strategy: &StrategyConfig,
    config: &BacktestConfig,
) -> Result<Vec<BacktestResult>, PapertraderError> {
    inputs
        .par_iter()
        .map(|(symbol, bars)| run_backtest(symbol, bars, strategy, config))
        .collect::<Result<Vec<_>, _>>()
}
