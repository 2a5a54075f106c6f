//! Streaming paper-trading session.
//!
//! Bars arrive one at a time. Each bar is validated against the session's
//! history, run through the same engine the backtest uses, and every fill is
//! forwarded to the execution port before the next bar is accepted.
//! `on_bar` takes `&mut self`, so a session has exactly one writer.
//!
//! The session keeps every accepted bar and recomputes indicators over all of
//! them on each `on_bar`, so per-bar cost grows linearly with history. The
//! Wilder and EMA recurrences depend on the whole series, and truncating the
//! bars would drift from the backtest's values. Long-lived sessions should be
//! restarted periodically. The engine itself only keeps the last two
//! snapshots.

use tracing::{info, warn};

use crate::domain::backtest::{BacktestConfig, BacktestResult};
use crate::domain::config_validation::{validate_backtest_config, validate_strategy_config};
use crate::domain::engine::Engine;
use crate::domain::error::PapertraderError;
use crate::domain::metrics::PerformanceReport;
use crate::domain::ohlcv::Bar;
use crate::domain::position::PositionState;
use crate::domain::snapshot::compute_snapshots;
use crate::domain::strategy::StrategyConfig;
use crate::domain::trade::TradeEvent;
use crate::ports::execution_port::{ExecutionPort, OrderAck};

pub struct PaperSession<E: ExecutionPort> {
    engine: Engine,
    strategy: StrategyConfig,
    bars: Vec<Bar>,
    executor: E,
    acks: Vec<OrderAck>,
}

impl<E: ExecutionPort> PaperSession<E> {
    pub fn new(
        symbol: &str,
        strategy: StrategyConfig,
        config: &BacktestConfig,
        executor: E,
    ) -> Result<Self, PapertraderError> {
        validate_strategy_config(&strategy)?;
        validate_backtest_config(config)?;
        Ok(PaperSession {
            engine: Engine::new(symbol, strategy.clone(), config),
            strategy,
            bars: Vec::new(),
            executor,
            acks: Vec::new(),
        })
    }

    /// Accept one bar, returning the fills it produced.
    ///
    /// A bar that fails validation is rejected before any state changes.
    pub fn on_bar(&mut self, bar: Bar) -> Result<Vec<TradeEvent>, PapertraderError> {
        let index = self.bars.len();
        bar.validate(index)?;
        if let Some(previous) = self.bars.last() {
            if bar.timestamp <= previous.timestamp {
                return Err(PapertraderError::NonMonotonicTimestamp {
                    index,
                    previous: previous.timestamp,
                    current: bar.timestamp,
                });
            }
        }

        self.bars.push(bar);
        // Indicators are recomputed over the whole history so the snapshot is
        // exactly what the backtest would see at this bar.
        let snapshot = compute_snapshots(&self.bars, &self.strategy)
            .pop()
            .ok_or_else(|| PapertraderError::Data {
                reason: "snapshot missing for accepted bar".to_string(),
            })?;
        let current = &self.bars[index];
        let events = self.engine.on_bar(current, snapshot);
        self.dispatch(&events)?;
        Ok(events)
    }

    /// Flatten any open position at the last bar's close.
    pub fn close(&mut self) -> Result<Vec<TradeEvent>, PapertraderError> {
        let Some(last) = self.bars.last() else {
            return Ok(Vec::new());
        };
        let events = self.engine.close_out(last);
        self.dispatch(&events)?;
        if !events.is_empty() {
            info!(symbol = self.engine.symbol(), "session closed out");
        }
        Ok(events)
    }

    fn dispatch(&mut self, events: &[TradeEvent]) -> Result<(), PapertraderError> {
        for event in events {
            match self.executor.submit(event) {
                Ok(ack) => self.acks.push(ack),
                Err(err) => {
                    warn!(
                        symbol = %event.symbol,
                        side = %event.side,
                        reason = %event.reason,
                        error = %err,
                        "order submission failed"
                    );
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    pub fn state(&self) -> &PositionState {
        self.engine.state()
    }

    pub fn trades(&self) -> &[TradeEvent] {
        self.engine.trades()
    }

    pub fn acks(&self) -> &[OrderAck] {
        &self.acks
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn report(&self) -> PerformanceReport {
        self.engine.report()
    }

    pub fn into_result(self) -> BacktestResult {
        self.engine.into_result()
    }
}
