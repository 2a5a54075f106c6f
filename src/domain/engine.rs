//! Per-symbol trading engine shared by the backtest driver and the paper session.
//!
//! The engine owns everything a single symbol's run mutates: the position
//! state, the snapshot history the signal reads, the trade log and the
//! portfolio. Nothing in it is shared between runs.

use std::mem;

use tracing::trace;

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::metrics::PerformanceReport;
use crate::domain::ohlcv::Bar;
use crate::domain::portfolio::Portfolio;
use crate::domain::position::PositionState;
use crate::domain::signal::{Signal, evaluate_signal};
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::strategy::StrategyConfig;
use crate::domain::trade::{ClosedTrade, ExitReason, TradeEvent};

/// Snapshots the signal reads: the current bar and the one before it.
const SIGNAL_LOOKBACK: usize = 2;

#[derive(Debug, Clone)]
pub struct Engine {
    symbol: String,
    config: StrategyConfig,
    state: PositionState,
    history: Vec<IndicatorSnapshot>,
    trades: Vec<TradeEvent>,
    closed_trades: Vec<ClosedTrade>,
    portfolio: Portfolio,
}

impl Engine {
    pub fn new(symbol: &str, config: StrategyConfig, backtest: &BacktestConfig) -> Self {
        Engine {
            symbol: symbol.to_string(),
            config,
            state: PositionState::Flat,
            history: Vec::new(),
            trades: Vec::new(),
            closed_trades: Vec::new(),
            portfolio: Portfolio::new(
                backtest.initial_capital,
                backtest.position_size,
                backtest.commission_pct,
            ),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn trades(&self) -> &[TradeEvent] {
        &self.trades
    }

    pub fn history(&self) -> &[IndicatorSnapshot] {
        &self.history
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Process one bar to completion and return the fills it produced.
    ///
    /// `snapshot` must describe `bar` and be computed from bars up to and
    /// including it.
    pub fn on_bar(&mut self, bar: &Bar, snapshot: IndicatorSnapshot) -> Vec<TradeEvent> {
        if self.history.len() == SIGNAL_LOOKBACK {
            self.history.remove(0);
        }
        self.history.push(snapshot);
        let signal = evaluate_signal(&self.history, &self.config);
        if signal != Signal::Hold {
            trace!(symbol = %self.symbol, timestamp = %bar.timestamp, %signal, "signal");
        }

        let current = &self.history[self.history.len() - 1];
        let transition = mem::take(&mut self.state).step(
            &self.symbol,
            bar,
            current,
            signal,
            &self.config,
        );
        self.state = transition.state;
        self.book(&transition.events, transition.closed);

        let equity = self.portfolio.total_equity(bar.close);
        self.portfolio.record_equity(bar.timestamp, equity);
        transition.events
    }

    /// Force-close any open position at `bar.close` and restate that bar's equity.
    pub fn close_out(&mut self, bar: &Bar) -> Vec<TradeEvent> {
        let transition = mem::take(&mut self.state).force_close(bar, ExitReason::EndOfData);
        self.state = transition.state;
        if transition.events.is_empty() {
            return transition.events;
        }
        self.book(&transition.events, transition.closed);

        let equity = self.portfolio.total_equity(bar.close);
        self.portfolio.restate_last_equity(equity);
        transition.events
    }

    fn book(&mut self, events: &[TradeEvent], closed: Option<ClosedTrade>) {
        for event in events {
            self.portfolio.apply(event);
            self.trades.push(event.clone());
        }
        if let Some(closed) = closed {
            self.closed_trades.push(closed);
        }
    }

    pub fn report(&self) -> PerformanceReport {
        PerformanceReport::compute(
            &self.trades,
            &self.closed_trades,
            &self.portfolio.equity_curve,
        )
    }

    pub fn into_result(self) -> BacktestResult {
        let report = self.report();
        BacktestResult {
            symbol: self.symbol,
            strategy: self.config.name,
            initial_capital: self.portfolio.initial_capital,
            final_equity: self.portfolio.final_equity(),
            report,
            trades: self.trades,
            closed_trades: self.closed_trades,
            equity_curve: self.portfolio.equity_curve,
        }
    }
}
