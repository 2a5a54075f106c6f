//! Performance statistics over a trade log and equity curve.

use std::collections::BTreeMap;

use serde::Serialize;

use super::portfolio::EquityPoint;
use super::trade::{ClosedTrade, ExitReason, TradeEvent};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    /// Winning exits over all SELL / SELL_PARTIAL events.
    pub win_rate: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    /// Population standard deviation of per-bar equity returns, in percent.
    pub volatility_pct: f64,
    pub exit_reason_histogram: BTreeMap<ExitReason, usize>,
    pub total_exits: usize,
    pub winning_exits: usize,
    pub losing_exits: usize,
    pub round_trips: usize,
    /// Gross round-trip gains over gross losses; `None` without a losing round trip.
    pub profit_factor: Option<f64>,
    pub best_trade_pct: Option<f64>,
    pub worst_trade_pct: Option<f64>,
}

impl PerformanceReport {
    pub fn compute(
        trades: &[TradeEvent],
        closed_trades: &[ClosedTrade],
        equity_curve: &[EquityPoint],
    ) -> Self {
        let mut exit_reason_histogram = BTreeMap::new();
        let mut total_exits = 0usize;
        let mut winning_exits = 0usize;
        let mut losing_exits = 0usize;

        for event in trades.iter().filter(|e| e.is_exit()) {
            total_exits += 1;
            *exit_reason_histogram.entry(event.reason).or_insert(0) += 1;
            match event.profit_pct {
                Some(p) if p > 0.0 => winning_exits += 1,
                Some(p) if p < 0.0 => losing_exits += 1,
                _ => {}
            }
        }

        let win_rate = if total_exits > 0 {
            winning_exits as f64 / total_exits as f64
        } else {
            0.0
        };

        let total_return_pct = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) if first.equity > 0.0 => {
                (last.equity / first.equity - 1.0) * 100.0
            }
            _ => 0.0,
        };

        let (profit_factor, best_trade_pct, worst_trade_pct) = round_trip_stats(closed_trades);

        PerformanceReport {
            win_rate,
            total_return_pct,
            max_drawdown_pct: compute_drawdown(equity_curve) * 100.0,
            volatility_pct: compute_volatility(equity_curve) * 100.0,
            exit_reason_histogram,
            total_exits,
            winning_exits,
            losing_exits,
            round_trips: closed_trades.len(),
            profit_factor,
            best_trade_pct,
            worst_trade_pct,
        }
    }
}

/// Largest peak-to-trough decline, as a fraction of the peak.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

/// Population standard deviation of bar-to-bar equity returns, as a fraction.
fn compute_volatility(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

fn round_trip_stats(closed_trades: &[ClosedTrade]) -> (Option<f64>, Option<f64>, Option<f64>) {
    let mut gross_win = 0.0_f64;
    let mut gross_loss = 0.0_f64;
    let mut best: Option<f64> = None;
    let mut worst: Option<f64> = None;

    for trade in closed_trades {
        let pnl = trade.realized_pnl_pct;
        if pnl > 0.0 {
            gross_win += pnl;
        } else if pnl < 0.0 {
            gross_loss += pnl.abs();
        }
        best = Some(best.map_or(pnl, |b| b.max(pnl)));
        worst = Some(worst.map_or(pnl, |w| w.min(pnl)));
    }

    let profit_factor = if gross_loss > 0.0 {
        Some(gross_win / gross_loss)
    } else {
        None
    };

    (profit_factor, best, worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::Side;
    use chrono::{TimeZone, Utc};

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64),
                equity: v,
            })
            .collect()
    }

    fn make_event(side: Side, reason: ExitReason, profit_pct: Option<f64>) -> TradeEvent {
        TradeEvent {
            symbol: "BTC".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            side,
            price: 100.0,
            size_fraction: 0.5,
            reason,
            profit_pct,
        }
    }

    fn make_closed(pnl: f64) -> ClosedTrade {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ClosedTrade {
            symbol: "BTC".into(),
            entry_time: ts,
            exit_time: ts + chrono::Duration::hours(5),
            entry_price: 100.0,
            realized_pnl_pct: pnl,
            exit_reason: ExitReason::SignalFlip,
        }
    }

    #[test]
    fn report_empty() {
        let report = PerformanceReport::compute(&[], &[], &[]);
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.total_return_pct, 0.0);
        assert_eq!(report.max_drawdown_pct, 0.0);
        assert_eq!(report.volatility_pct, 0.0);
        assert!(report.exit_reason_histogram.is_empty());
        assert_eq!(report.profit_factor, None);
        assert_eq!(report.best_trade_pct, None);
    }

    #[test]
    fn win_rate_counts_exit_events() {
        let trades = vec![
            make_event(Side::Buy, ExitReason::Entry, None),
            make_event(Side::SellPartial, ExitReason::Tp1Hit, Some(5.0)),
            make_event(Side::Sell, ExitReason::StopLoss, Some(-2.0)),
            make_event(Side::Buy, ExitReason::Entry, None),
            make_event(Side::Sell, ExitReason::RsiExit, Some(3.0)),
            make_event(Side::Sell, ExitReason::EndOfData, Some(0.0)),
        ];
        let report = PerformanceReport::compute(&trades, &[], &[]);

        assert_eq!(report.total_exits, 4);
        assert_eq!(report.winning_exits, 2);
        assert_eq!(report.losing_exits, 1);
        assert!((report.win_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn histogram_excludes_entries() {
        let trades = vec![
            make_event(Side::Buy, ExitReason::Entry, None),
            make_event(Side::SellPartial, ExitReason::Tp1Hit, Some(5.0)),
            make_event(Side::SellPartial, ExitReason::Tp2Hit, Some(8.0)),
            make_event(Side::Buy, ExitReason::Entry, None),
            make_event(Side::SellPartial, ExitReason::Tp1Hit, Some(5.0)),
            make_event(Side::Sell, ExitReason::TrailingStop, Some(4.0)),
        ];
        let report = PerformanceReport::compute(&trades, &[], &[]);

        assert_eq!(report.exit_reason_histogram.get(&ExitReason::Entry), None);
        assert_eq!(report.exit_reason_histogram[&ExitReason::Tp1Hit], 2);
        assert_eq!(report.exit_reason_histogram[&ExitReason::Tp2Hit], 1);
        assert_eq!(report.exit_reason_histogram[&ExitReason::TrailingStop], 1);
    }

    #[test]
    fn histogram_serializes_in_reason_order() {
        let trades = vec![
            make_event(Side::Sell, ExitReason::StopLoss, Some(-1.0)),
            make_event(Side::SellPartial, ExitReason::Tp1Hit, Some(1.0)),
        ];
        let report = PerformanceReport::compute(&trades, &[], &[]);
        let json = serde_json::to_string(&report.exit_reason_histogram).unwrap();
        assert_eq!(json, r#"{"TP1_HIT":1,"STOP_LOSS":1}"#);
    }

    #[test]
    fn total_return_from_equity_curve() {
        let curve = make_equity_curve(&[10_000.0, 10_500.0, 11_000.0]);
        let report = PerformanceReport::compute(&[], &[], &curve);
        assert!((report.total_return_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let report = PerformanceReport::compute(&[], &[], &curve);
        let expected = (110.0 - 80.0) / 110.0 * 100.0;
        assert!((report.max_drawdown_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn volatility_population_stddev() {
        // returns: +10%, -10%
        let curve = make_equity_curve(&[100.0, 110.0, 99.0]);
        let report = PerformanceReport::compute(&[], &[], &curve);
        assert!((report.volatility_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn flat_curve_has_no_volatility() {
        let curve = make_equity_curve(&[100.0, 100.0, 100.0]);
        let report = PerformanceReport::compute(&[], &[], &curve);
        assert_eq!(report.volatility_pct, 0.0);
        assert_eq!(report.max_drawdown_pct, 0.0);
    }

    #[test]
    fn round_trip_statistics() {
        let closed = vec![make_closed(6.0), make_closed(-2.0), make_closed(4.0)];
        let report = PerformanceReport::compute(&[], &closed, &[]);

        assert_eq!(report.round_trips, 3);
        assert!((report.profit_factor.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(report.best_trade_pct, Some(6.0));
        assert_eq!(report.worst_trade_pct, Some(-2.0));
    }

    #[test]
    fn profit_factor_without_losses_is_none() {
        let closed = vec![make_closed(6.0)];
        let report = PerformanceReport::compute(&[], &closed, &[]);
        assert_eq!(report.profit_factor, None);
    }
}
