//! Cash ledger and equity tracking.
//!
//! The position state machine speaks in fractions of a position; the
//! portfolio turns those fills into units and cash so the equity curve can be
//! marked to market every bar.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::trade::{Side, TradeEvent};

const UNIT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Share of cash committed on each entry, in (0, 1].
    pub position_size: f64,
    /// Commission per fill, in percent of notional.
    pub commission_pct: f64,
    pub units_held: f64,
    /// Units bought at the last entry; partial exits are sized from this.
    pub entry_units: f64,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64, position_size: f64, commission_pct: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            position_size,
            commission_pct,
            units_held: 0.0,
            entry_units: 0.0,
            equity_curve: Vec::new(),
        }
    }

    fn commission_rate(&self) -> f64 {
        self.commission_pct / 100.0
    }

    /// Book a fill against cash and holdings.
    pub fn apply(&mut self, event: &TradeEvent) {
        let rate = self.commission_rate();
        match event.side {
            Side::Buy => {
                let budget = self.cash * self.position_size;
                let units = budget / (event.price * (1.0 + rate));
                self.cash -= units * event.price * (1.0 + rate);
                self.units_held += units;
                self.entry_units = units;
            }
            Side::SellPartial => {
                let units = (event.size_fraction * self.entry_units).min(self.units_held);
                self.sell_units(units, event.price, rate);
            }
            Side::Sell => {
                let units = self.units_held;
                self.sell_units(units, event.price, rate);
            }
        }
    }

    fn sell_units(&mut self, units: f64, price: f64, rate: f64) {
        self.cash += units * price * (1.0 - rate);
        self.units_held -= units;
        if self.units_held <= UNIT_EPSILON {
            self.units_held = 0.0;
        }
    }

    pub fn total_equity(&self, price: f64) -> f64 {
        self.cash + self.units_held * price
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Replace the most recent equity mark, e.g. after a close-out on the same bar.
    pub fn restate_last_equity(&mut self, equity: f64) {
        if let Some(last) = self.equity_curve.last_mut() {
            last.equity = equity;
        }
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }
}
