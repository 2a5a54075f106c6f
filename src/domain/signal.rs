//! Signal generation from indicator snapshots.
//!
//! A signal is a pure function of the snapshot history window; calling it
//! twice on the same window gives the same answer.

use std::fmt;

use serde::Serialize;

use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::strategy::StrategyConfig;
use crate::domain::trade::ExitReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCause {
    RsiOverbought,
    TrendFlip,
}

impl ExitCause {
    pub fn reason(self) -> ExitReason {
        match self {
            ExitCause::RsiOverbought => ExitReason::RsiExit,
            ExitCause::TrendFlip => ExitReason::SignalFlip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Signal {
    EnterLong,
    Hold,
    ExitLong(ExitCause),
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::EnterLong => write!(f, "ENTER_LONG"),
            Signal::Hold => write!(f, "HOLD"),
            Signal::ExitLong(ExitCause::RsiOverbought) => write!(f, "EXIT_LONG(RSI)"),
            Signal::ExitLong(ExitCause::TrendFlip) => write!(f, "EXIT_LONG(TREND)"),
        }
    }
}

/// Evaluate the signal for the last snapshot in `history`.
///
/// Exit clauses are checked first. A missing indicator value makes its
/// clause false, so warm-up bars fall through to `Hold`.
pub fn evaluate_signal(history: &[IndicatorSnapshot], config: &StrategyConfig) -> Signal {
    let Some(current) = history.last() else {
        return Signal::Hold;
    };
    let previous = history.len().checked_sub(2).map(|i| &history[i]);

    if let Some(previous) = previous {
        if crossed_below(previous, current) {
            return Signal::ExitLong(ExitCause::TrendFlip);
        }
    }
    if current.rsi.is_some_and(|rsi| rsi > config.rsi_overbought) {
        return Signal::ExitLong(ExitCause::RsiOverbought);
    }

    if entry_conditions_met(current, config) {
        Signal::EnterLong
    } else {
        Signal::Hold
    }
}

/// Fast SMA moves from at-or-above the slow SMA to strictly below it.
fn crossed_below(previous: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    match (
        previous.sma_fast,
        previous.sma_slow,
        current.sma_fast,
        current.sma_slow,
    ) {
        (Some(fast_prev), Some(slow_prev), Some(fast), Some(slow)) => {
            fast < slow && fast_prev >= slow_prev
        }
        _ => false,
    }
}

fn entry_conditions_met(s: &IndicatorSnapshot, config: &StrategyConfig) -> bool {
    let (Some(rsi), Some(fast), Some(slow), Some(adx), Some(volume_avg)) =
        (s.rsi, s.sma_fast, s.sma_slow, s.adx, s.volume_avg)
    else {
        return false;
    };

    rsi < config.rsi_oversold
        && fast > slow
        && adx > config.adx_threshold
        && s.volume > volume_avg * config.volume_surge_factor
        && s.close > fast
}
