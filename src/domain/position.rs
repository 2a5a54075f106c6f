//! Position state machine.
//!
//! A position is either `Flat` or `Open`. Each bar the open position is run
//! through the exit checks in a fixed priority order:
//!
//! 1. stop-loss (full exit)
//! 2. take-profit tiers, nearest first (partial exits, several per bar allowed)
//! 3. trailing-stop arming and peak ratchet
//! 4. trailing-stop check (full exit)
//! 5. indicator exit signal (full exit)
//!
//! `step` consumes the current state and returns the next one together with
//! the fills it produced, so a state value is never mutated behind a caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::domain::ohlcv::Bar;
use crate::domain::signal::Signal;
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::strategy::StrategyConfig;
use crate::domain::trade::{ClosedTrade, ExitReason, Side, TradeEvent, pct_return};

/// Remaining size at or below this is treated as fully closed.
pub const DUST_THRESHOLD: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TakeProfitTier {
    pub price: f64,
    pub size_fraction: f64,
    pub hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Fraction of the original size still held, in (0, 1].
    pub remaining_size: f64,
    pub stop_price: f64,
    pub take_profit_tiers: Vec<TakeProfitTier>,
    pub trailing_stop_active: bool,
    pub trailing_peak_price: f64,
    /// Size-weighted realized return so far, in percent.
    pub realized_pnl_pct: f64,
}

impl Position {
    /// Open a position at `bar.close` with ATR-based stop and targets.
    pub fn open(symbol: &str, bar: &Bar, atr: f64, config: &StrategyConfig) -> Self {
        let entry_price = bar.close;
        let take_profit_tiers = config
            .take_profit_levels()
            .into_iter()
            .map(|(multiplier, size_fraction)| TakeProfitTier {
                price: entry_price + atr * multiplier,
                size_fraction,
                hit: false,
            })
            .collect();

        Position {
            symbol: symbol.to_string(),
            entry_price,
            entry_time: bar.timestamp,
            remaining_size: 1.0,
            stop_price: entry_price - atr * config.atr_stop_multiplier,
            take_profit_tiers,
            trailing_stop_active: false,
            trailing_peak_price: entry_price,
            realized_pnl_pct: 0.0,
        }
    }

    pub fn unrealized_pct(&self, price: f64) -> f64 {
        pct_return(self.entry_price, price)
    }

    pub fn trailing_level(&self, trailing_percentage: f64) -> f64 {
        self.trailing_peak_price * (1.0 - trailing_percentage)
    }

    fn exit_event(
        &self,
        bar: &Bar,
        side: Side,
        price: f64,
        size: f64,
        reason: ExitReason,
    ) -> TradeEvent {
        TradeEvent {
            symbol: self.symbol.clone(),
            timestamp: bar.timestamp,
            side,
            price,
            size_fraction: size,
            reason,
            profit_pct: Some(self.unrealized_pct(price)),
        }
    }

    /// Sell everything still held and produce the round-trip record.
    fn close_all(
        mut self,
        bar: &Bar,
        price: f64,
        reason: ExitReason,
        events: &mut Vec<TradeEvent>,
    ) -> ClosedTrade {
        let size = self.remaining_size;
        events.push(self.exit_event(bar, Side::Sell, price, size, reason));
        self.realized_pnl_pct += size * self.unrealized_pct(price);
        self.remaining_size = 0.0;
        debug!(
            symbol = %self.symbol,
            price,
            reason = %reason,
            pnl_pct = self.realized_pnl_pct,
            "position closed"
        );
        self.into_closed(bar, reason)
    }

    fn into_closed(self, bar: &Bar, reason: ExitReason) -> ClosedTrade {
        ClosedTrade {
            symbol: self.symbol,
            entry_time: self.entry_time,
            exit_time: bar.timestamp,
            entry_price: self.entry_price,
            realized_pnl_pct: self.realized_pnl_pct,
            exit_reason: reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Open(Position),
}

/// Result of feeding one bar to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: PositionState,
    pub events: Vec<TradeEvent>,
    pub closed: Option<ClosedTrade>,
}

impl Transition {
    fn unchanged(state: PositionState) -> Self {
        Transition {
            state,
            events: Vec::new(),
            closed: None,
        }
    }

    fn flat(events: Vec<TradeEvent>, closed: ClosedTrade) -> Self {
        Transition {
            state: PositionState::Flat,
            events,
            closed: Some(closed),
        }
    }
}

impl PositionState {
    pub fn is_open(&self) -> bool {
        matches!(self, PositionState::Open(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Open(position) => Some(position),
            PositionState::Flat => None,
        }
    }

    /// Advance the state machine by one bar.
    pub fn step(
        self,
        symbol: &str,
        bar: &Bar,
        snapshot: &IndicatorSnapshot,
        signal: Signal,
        config: &StrategyConfig,
    ) -> Transition {
        match self {
            PositionState::Flat => enter(symbol, bar, snapshot, signal, config),
            PositionState::Open(position) => manage(position, bar, signal, config),
        }
    }

    /// Close any open position at `bar.close`.
    pub fn force_close(self, bar: &Bar, reason: ExitReason) -> Transition {
        match self {
            PositionState::Flat => Transition::unchanged(PositionState::Flat),
            PositionState::Open(position) => {
                let mut events = Vec::new();
                let closed = position.close_all(bar, bar.close, reason, &mut events);
                Transition::flat(events, closed)
            }
        }
    }
}

fn enter(
    symbol: &str,
    bar: &Bar,
    snapshot: &IndicatorSnapshot,
    signal: Signal,
    config: &StrategyConfig,
) -> Transition {
    if signal != Signal::EnterLong {
        return Transition::unchanged(PositionState::Flat);
    }
    let Some(atr) = snapshot.atr.filter(|atr| *atr > 0.0) else {
        return Transition::unchanged(PositionState::Flat);
    };

    let position = Position::open(symbol, bar, atr, config);
    debug!(
        symbol,
        price = position.entry_price,
        stop = position.stop_price,
        atr,
        "position opened"
    );
    let event = TradeEvent {
        symbol: symbol.to_string(),
        timestamp: bar.timestamp,
        side: Side::Buy,
        price: position.entry_price,
        size_fraction: 1.0,
        reason: ExitReason::Entry,
        profit_pct: None,
    };

    Transition {
        state: PositionState::Open(position),
        events: vec![event],
        closed: None,
    }
}

fn manage(
    mut position: Position,
    bar: &Bar,
    signal: Signal,
    config: &StrategyConfig,
) -> Transition {
    let mut events = Vec::new();

    // 1. Stop-loss: a gap below the stop fills at the open.
    if bar.low <= position.stop_price {
        let price = position.stop_price.min(bar.open);
        let closed = position.close_all(bar, price, ExitReason::StopLoss, &mut events);
        return Transition::flat(events, closed);
    }

    // 2. Take-profit tiers in ascending order.
    for index in 0..position.take_profit_tiers.len() {
        let tier = &position.take_profit_tiers[index];
        if tier.hit || bar.high < tier.price {
            continue;
        }
        let Some(reason) = ExitReason::take_profit(index) else {
            break;
        };
        let price = tier.price.max(bar.open);
        let size = tier.size_fraction.min(position.remaining_size);

        position.take_profit_tiers[index].hit = true;
        events.push(position.exit_event(bar, Side::SellPartial, price, size, reason));
        position.realized_pnl_pct += size * position.unrealized_pct(price);
        position.remaining_size -= size;
        debug!(
            symbol = %position.symbol,
            price,
            size,
            reason = %reason,
            remaining = position.remaining_size,
            "take-profit tier hit"
        );

        if position.remaining_size <= DUST_THRESHOLD {
            position.remaining_size = 0.0;
            let closed = position.into_closed(bar, reason);
            return Transition::flat(events, closed);
        }
    }

    // 3. Trailing-stop arming, then ratchet the peak while armed.
    if !position.trailing_stop_active
        && position.unrealized_pct(bar.high) >= config.trailing_activation_pct
    {
        position.trailing_stop_active = true;
        debug!(symbol = %position.symbol, high = bar.high, "trailing stop armed");
    }
    if position.trailing_stop_active {
        position.trailing_peak_price = position.trailing_peak_price.max(bar.high);
    }

    // 4. Trailing-stop check.
    if position.trailing_stop_active {
        let level = position.trailing_level(config.trailing_percentage);
        if bar.low <= level {
            let price = level.min(bar.open);
            let closed = position.close_all(bar, price, ExitReason::TrailingStop, &mut events);
            return Transition::flat(events, closed);
        }
    }

    // 5. Indicator exit at the close.
    if let Signal::ExitLong(cause) = signal {
        let closed = position.close_all(bar, bar.close, cause.reason(), &mut events);
        return Transition::flat(events, closed);
    }

    Transition {
        state: PositionState::Open(position),
        events,
        closed: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::ExitCause;
    use chrono::TimeZone;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(i)
    }

    fn bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: ts(i),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    fn snapshot(i: i64, atr: Option<f64>) -> IndicatorSnapshot {
        IndicatorSnapshot {
            timestamp: ts(i),
            close: 100.0,
            volume: 1000.0,
            rsi: Some(25.0),
            macd_line: None,
            macd_signal: None,
            macd_histogram: None,
            sma_fast: Some(99.0),
            sma_slow: Some(98.0),
            atr,
            adx: Some(30.0),
            volume_avg: Some(800.0),
        }
    }

    /// Entry at 100 with ATR 2: stop 96, TP1 105, TP2 108.
    fn open_state(config: &StrategyConfig) -> PositionState {
        let t = PositionState::Flat.step(
            "BTC",
            &bar(0, 100.0, 100.5, 99.5, 100.0),
            &snapshot(0, Some(2.0)),
            Signal::EnterLong,
            config,
        );
        assert_eq!(t.events.len(), 1);
        t.state
    }

    fn hold(state: PositionState, b: Bar, config: &StrategyConfig) -> Transition {
        state.step("BTC", &b, &snapshot(1, Some(2.0)), Signal::Hold, config)
    }

    #[test]
    fn entry_sets_stop_and_tiers() {
        let config = StrategyConfig::default();
        let state = open_state(&config);
        let position = state.position().unwrap();

        assert_eq!(position.entry_price, 100.0);
        assert_eq!(position.stop_price, 96.0);
        assert_eq!(position.take_profit_tiers[0].price, 105.0);
        assert_eq!(position.take_profit_tiers[1].price, 108.0);
        assert_eq!(position.remaining_size, 1.0);
        assert_eq!(position.trailing_peak_price, 100.0);
        assert!(!position.trailing_stop_active);
    }

    #[test]
    fn entry_event_has_no_profit() {
        let config = StrategyConfig::default();
        let t = PositionState::Flat.step(
            "BTC",
            &bar(0, 100.0, 100.5, 99.5, 100.0),
            &snapshot(0, Some(2.0)),
            Signal::EnterLong,
            &config,
        );
        let event = &t.events[0];
        assert_eq!(event.side, Side::Buy);
        assert_eq!(event.reason, ExitReason::Entry);
        assert_eq!(event.size_fraction, 1.0);
        assert_eq!(event.profit_pct, None);
    }

    #[test]
    fn no_entry_without_atr() {
        let config = StrategyConfig::default();
        for atr in [None, Some(0.0)] {
            let t = PositionState::Flat.step(
                "BTC",
                &bar(0, 100.0, 100.5, 99.5, 100.0),
                &snapshot(0, atr),
                Signal::EnterLong,
                &config,
            );
            assert_eq!(t.state, PositionState::Flat);
            assert!(t.events.is_empty());
        }
    }

    #[test]
    fn flat_ignores_exit_signal() {
        let config = StrategyConfig::default();
        let t = PositionState::Flat.step(
            "BTC",
            &bar(0, 100.0, 100.5, 99.5, 100.0),
            &snapshot(0, Some(2.0)),
            Signal::ExitLong(ExitCause::RsiOverbought),
            &config,
        );
        assert_eq!(t.state, PositionState::Flat);
        assert!(t.events.is_empty());
    }

    #[test]
    fn quiet_bar_keeps_position_open() {
        let config = StrategyConfig::default();
        let t = hold(open_state(&config), bar(1, 100.0, 101.0, 99.0, 100.5), &config);
        assert!(t.state.is_open());
        assert!(t.events.is_empty());
        assert!(t.closed.is_none());
    }

    #[test]
    fn stop_loss_beats_take_profit_in_same_bar() {
        let config = StrategyConfig::default();
        // low breaches 96 and high breaches 105
        let t = hold(open_state(&config), bar(1, 100.0, 106.0, 95.0, 100.0), &config);

        assert_eq!(t.state, PositionState::Flat);
        assert_eq!(t.events.len(), 1);
        assert_eq!(t.events[0].side, Side::Sell);
        assert_eq!(t.events[0].reason, ExitReason::StopLoss);
        assert_eq!(t.events[0].size_fraction, 1.0);
        assert_eq!(t.events[0].price, 96.0);
        assert_eq!(t.closed.unwrap().exit_reason, ExitReason::StopLoss);
    }

    #[test]
    fn stop_gap_fills_at_open() {
        let config = StrategyConfig::default();
        let t = hold(open_state(&config), bar(1, 94.0, 94.5, 93.0, 94.0), &config);
        assert_eq!(t.events[0].price, 94.0);
        assert!((t.events[0].profit_pct.unwrap() + 6.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_at_exact_high_counts() {
        let config = StrategyConfig::default();
        let t = hold(open_state(&config), bar(1, 101.0, 105.0, 102.5, 104.0), &config);

        assert_eq!(t.events.len(), 1);
        assert_eq!(t.events[0].side, Side::SellPartial);
        assert_eq!(t.events[0].reason, ExitReason::Tp1Hit);
        assert_eq!(t.events[0].price, 105.0);
        assert_eq!(t.events[0].size_fraction, 0.5);

        let position = t.state.position().unwrap();
        assert_eq!(position.remaining_size, 0.5);
        assert!(position.take_profit_tiers[0].hit);
        assert!((position.realized_pnl_pct - 2.5).abs() < 1e-9);
    }

    #[test]
    fn gap_through_both_tiers_fires_in_order_and_closes() {
        let config = StrategyConfig::default();
        let t = hold(open_state(&config), bar(1, 101.0, 109.0, 100.5, 108.5), &config);

        let reasons: Vec<ExitReason> = t.events.iter().map(|e| e.reason).collect();
        assert_eq!(reasons, vec![ExitReason::Tp1Hit, ExitReason::Tp2Hit]);
        assert!(t.events.iter().all(|e| e.side == Side::SellPartial));
        assert_eq!(t.state, PositionState::Flat);

        let closed = t.closed.unwrap();
        assert_eq!(closed.exit_reason, ExitReason::Tp2Hit);
        // 0.5 * 5% + 0.5 * 8%
        assert!((closed.realized_pnl_pct - 6.5).abs() < 1e-9);
    }

    #[test]
    fn take_profit_gap_fills_at_open() {
        let config = StrategyConfig::default();
        let t = hold(open_state(&config), bar(1, 106.0, 107.0, 105.5, 106.5), &config);
        assert_eq!(t.events[0].reason, ExitReason::Tp1Hit);
        assert_eq!(t.events[0].price, 106.0);
    }

    #[test]
    fn tier_fires_only_once() {
        let config = StrategyConfig::default();
        let t = hold(open_state(&config), bar(1, 101.0, 105.5, 102.5, 104.0), &config);
        let t = hold(t.state, bar(2, 104.0, 105.5, 103.0, 104.0), &config);
        assert!(t.events.iter().all(|e| e.reason != ExitReason::Tp1Hit));
    }

    #[test]
    fn trailing_arms_and_fires() {
        let config = StrategyConfig {
            atr_tp1_multiplier: 20.0,
            atr_tp2_multiplier: 30.0,
            ..StrategyConfig::default()
        };
        // high 106 is +6%, above the 5% activation
        let t = hold(open_state(&config), bar(1, 101.0, 106.0, 104.0, 105.0), &config);
        let position = t.state.position().unwrap();
        assert!(position.trailing_stop_active);
        assert_eq!(position.trailing_peak_price, 106.0);

        // peak ratchets to 110, level 106.7
        let t = hold(t.state, bar(2, 105.0, 110.0, 107.0, 109.0), &config);
        assert_eq!(t.state.position().unwrap().trailing_peak_price, 110.0);

        let t = hold(t.state, bar(3, 108.0, 108.5, 106.0, 106.5), &config);
        assert_eq!(t.events.len(), 1);
        assert_eq!(t.events[0].reason, ExitReason::TrailingStop);
        assert!((t.events[0].price - 106.7).abs() < 1e-9);
        assert_eq!(t.state, PositionState::Flat);
    }

    #[test]
    fn trailing_stop_beats_indicator_exit() {
        let config = StrategyConfig {
            atr_tp1_multiplier: 20.0,
            atr_tp2_multiplier: 30.0,
            ..StrategyConfig::default()
        };
        let t = hold(open_state(&config), bar(1, 101.0, 106.0, 104.0, 105.0), &config);
        let t = hold(t.state, bar(2, 105.0, 110.0, 107.0, 109.0), &config);

        let t = t.state.step(
            "BTC",
            &bar(3, 108.0, 108.5, 106.0, 106.5),
            &snapshot(3, Some(2.0)),
            Signal::ExitLong(ExitCause::RsiOverbought),
            &config,
        );
        assert_eq!(t.events.len(), 1);
        assert_eq!(t.events[0].side, Side::Sell);
        assert_eq!(t.events[0].reason, ExitReason::TrailingStop);
        assert!((t.events[0].price - 106.7).abs() < 1e-9);
        assert_eq!(t.closed.unwrap().exit_reason, ExitReason::TrailingStop);
    }

    #[test]
    fn stop_loss_beats_armed_trailing_stop() {
        let config = StrategyConfig {
            atr_tp1_multiplier: 20.0,
            atr_tp2_multiplier: 30.0,
            ..StrategyConfig::default()
        };
        let t = hold(open_state(&config), bar(1, 101.0, 106.0, 104.0, 105.0), &config);
        assert!(t.state.position().unwrap().trailing_stop_active);

        // low breaches both the trailing level 102.82 and the stop at 96
        let t = t.state.step(
            "BTC",
            &bar(2, 100.0, 100.5, 95.0, 95.5),
            &snapshot(2, Some(2.0)),
            Signal::ExitLong(ExitCause::TrendFlip),
            &config,
        );
        assert_eq!(t.events.len(), 1);
        assert_eq!(t.events[0].reason, ExitReason::StopLoss);
        assert_eq!(t.events[0].price, 96.0);
        assert_eq!(t.events[0].size_fraction, 1.0);
        assert_eq!(t.state, PositionState::Flat);
    }

    #[test]
    fn trailing_peak_never_moves_down() {
        let config = StrategyConfig {
            atr_tp1_multiplier: 20.0,
            atr_tp2_multiplier: 30.0,
            trailing_percentage: 0.5,
            ..StrategyConfig::default()
        };
        let t = hold(open_state(&config), bar(1, 101.0, 110.0, 104.0, 105.0), &config);
        let t = hold(t.state, bar(2, 104.0, 104.5, 103.0, 104.0), &config);
        assert_eq!(t.state.position().unwrap().trailing_peak_price, 110.0);
    }

    #[test]
    fn indicator_exit_sells_remaining_at_close() {
        let config = StrategyConfig::default();
        let t = hold(open_state(&config), bar(1, 101.0, 105.0, 102.5, 104.0), &config);
        let t = t.state.step(
            "BTC",
            &bar(2, 104.0, 104.5, 102.0, 103.0),
            &snapshot(2, Some(2.0)),
            Signal::ExitLong(ExitCause::RsiOverbought),
            &config,
        );

        assert_eq!(t.events.len(), 1);
        assert_eq!(t.events[0].reason, ExitReason::RsiExit);
        assert_eq!(t.events[0].price, 103.0);
        assert_eq!(t.events[0].size_fraction, 0.5);
        // 0.5 * 5% + 0.5 * 3%
        assert!((t.closed.unwrap().realized_pnl_pct - 4.0).abs() < 1e-9);
    }

    #[test]
    fn trend_flip_uses_signal_flip_reason() {
        let config = StrategyConfig::default();
        let t = open_state(&config).step(
            "BTC",
            &bar(1, 100.0, 101.0, 99.0, 100.0),
            &snapshot(1, Some(2.0)),
            Signal::ExitLong(ExitCause::TrendFlip),
            &config,
        );
        assert_eq!(t.events[0].reason, ExitReason::SignalFlip);
    }

    #[test]
    fn dust_remaining_is_closed() {
        let config = StrategyConfig {
            tp_size_fractions: vec![0.5, 0.5 - 1e-12],
            ..StrategyConfig::default()
        };
        let t = hold(open_state(&config), bar(1, 101.0, 109.0, 100.5, 108.5), &config);
        assert_eq!(t.state, PositionState::Flat);
        assert_eq!(t.events.len(), 2);
    }

    #[test]
    fn fractions_sum_to_one_at_close() {
        let config = StrategyConfig::default();
        let t = hold(open_state(&config), bar(1, 101.0, 105.0, 102.5, 104.0), &config);
        let mut events = t.events;
        let t = t.state.force_close(&bar(2, 104.0, 104.5, 103.0, 104.0), ExitReason::EndOfData);
        events.extend(t.events);

        let total: f64 = events.iter().map(|e| e.size_fraction).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert_eq!(events.last().unwrap().reason, ExitReason::EndOfData);
    }

    #[test]
    fn force_close_when_flat_is_noop() {
        let t = PositionState::Flat.force_close(&bar(0, 1.0, 1.0, 1.0, 1.0), ExitReason::EndOfData);
        assert_eq!(t.state, PositionState::Flat);
        assert!(t.events.is_empty());
        assert!(t.closed.is_none());
    }
}
