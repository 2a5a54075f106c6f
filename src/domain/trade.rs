//! Trade log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
    SellPartial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "ENTRY")]
    Entry,
    #[serde(rename = "TP1_HIT")]
    Tp1Hit,
    #[serde(rename = "TP2_HIT")]
    Tp2Hit,
    #[serde(rename = "TRAILING_STOP")]
    TrailingStop,
    #[serde(rename = "STOP_LOSS")]
    StopLoss,
    #[serde(rename = "RSI_EXIT")]
    RsiExit,
    #[serde(rename = "SIGNAL_FLIP")]
    SignalFlip,
    #[serde(rename = "END_OF_DATA")]
    EndOfData,
}

impl ExitReason {
    /// Reason label for the take-profit tier at `index` (0-based).
    ///
    /// Validation allows exactly two tiers, so there is no label past TP2.
    pub fn take_profit(index: usize) -> Option<Self> {
        match index {
            0 => Some(ExitReason::Tp1Hit),
            1 => Some(ExitReason::Tp2Hit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Entry => "ENTRY",
            ExitReason::Tp1Hit => "TP1_HIT",
            ExitReason::Tp2Hit => "TP2_HIT",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::RsiExit => "RSI_EXIT",
            ExitReason::SignalFlip => "SIGNAL_FLIP",
            ExitReason::EndOfData => "END_OF_DATA",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
            Side::SellPartial => "SELL_PARTIAL",
        })
    }
}

/// One fill in the trade log. `size_fraction` is relative to the original
/// position size; `profit_pct` is `None` for entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub side: Side,
    pub price: f64,
    pub size_fraction: f64,
    pub reason: ExitReason,
    pub profit_pct: Option<f64>,
}

impl TradeEvent {
    pub fn is_exit(&self) -> bool {
        matches!(self.side, Side::Sell | Side::SellPartial)
    }
}

/// A completed round trip, produced when a position returns to flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    /// Size-weighted return over every exit of the position, in percent.
    pub realized_pnl_pct: f64,
    pub exit_reason: ExitReason,
}

/// Percent return from `entry` to `exit`; 0 when the entry price is not positive.
pub fn pct_return(entry: f64, exit: f64) -> f64 {
    if entry <= 0.0 {
        return 0.0;
    }
    (exit / entry - 1.0) * 100.0
}
