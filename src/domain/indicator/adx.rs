//! ADX (Average Directional Index), Wilder.
//!
//! 1. +DM = H - prev H when it exceeds prev L - L and is positive, else 0
//!    -DM = prev L - L when it exceeds H - prev H and is positive, else 0
//! 2. Wilder-smooth TR, +DM and -DM over n bars (starting at the second bar)
//! 3. +DI = 100 * sm(+DM) / sm(TR), -DI = 100 * sm(-DM) / sm(TR)
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI), 0 when both DIs are 0
//! 5. ADX = Wilder-smoothed DX
//!
//! Warmup: first (2n - 1) bars are invalid.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::indicator_helpers::{simple_series, true_ranges, wilder_smooth};
use crate::domain::ohlcv::Bar;

pub fn calculate_adx(bars: &[Bar], period: usize) -> IndicatorSeries {
    let n = bars.len();
    let mut plus_dm: Vec<Option<f64>> = vec![None; n];
    let mut minus_dm: Vec<Option<f64>> = vec![None; n];
    let mut tr: Vec<Option<f64>> = vec![None; n];

    let ranges = true_ranges(bars);
    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;

        plus_dm[i] = Some(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm[i] = Some(if down > up && down > 0.0 { down } else { 0.0 });
        tr[i] = Some(ranges[i]);
    }

    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let dx: Vec<Option<f64>> = (0..n)
        .map(|i| match (smooth_tr[i], smooth_plus[i], smooth_minus[i]) {
            (Some(tr), Some(p), Some(m)) => Some(directional_index(tr, p, m)),
            _ => None,
        })
        .collect();

    simple_series(bars, IndicatorType::Adx(period), wilder_smooth(&dx, period))
}

fn directional_index(smooth_tr: f64, smooth_plus: f64, smooth_minus: f64) -> f64 {
    // A zero range means no directional movement at all.
    if smooth_tr == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * smooth_plus / smooth_tr;
    let minus_di = 100.0 * smooth_minus / smooth_tr;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / di_sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_bars(data: &[(f64, f64, f64)]) -> Vec<Bar> {
        data.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Bar {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64),
                open: close,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn trending_up(len: usize) -> Vec<Bar> {
        let data: Vec<(f64, f64, f64)> = (0..len)
            .map(|i| {
                let c = 100.0 + i as f64 * 2.0;
                (c + 1.0, c - 1.0, c)
            })
            .collect();
        make_bars(&data)
    }

    #[test]
    fn adx_warmup() {
        let series = calculate_adx(&trending_up(12), 3);

        assert_eq!(series.len(), 12);
        for i in 0..5 {
            assert!(!series.values[i].valid, "Bar {} should be invalid", i);
        }
        assert!(series.values[5].valid);
    }

    #[test]
    fn adx_strong_uptrend_is_high() {
        let series = calculate_adx(&trending_up(40), 14);
        let adx = series.value_at(39).unwrap();
        // only +DM is ever non-zero, so DX is 100 on every bar
        assert!((adx - 100.0).abs() < 1e-9, "got {adx}");
    }

    #[test]
    fn adx_bounds() {
        let data: Vec<(f64, f64, f64)> = (0..40)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.9).sin() * 8.0;
                (c + 1.5, c - 1.5, c)
            })
            .collect();
        let series = calculate_adx(&make_bars(&data), 5);

        for i in 0..series.len() {
            if let Some(adx) = series.value_at(i) {
                assert!((0.0..=100.0).contains(&adx), "ADX {adx} out of range");
            }
        }
    }

    #[test]
    fn adx_flat_market_is_zero() {
        let series = calculate_adx(&make_bars(&[(101.0, 99.0, 100.0); 20]), 4);
        assert_eq!(series.value_at(19), Some(0.0));
    }

    #[test]
    fn adx_inside_bar_has_no_directional_move() {
        // second bar sits inside the first: both DMs are zero
        let bars = make_bars(&[(110.0, 90.0, 100.0), (105.0, 95.0, 100.0)]);
        let series = calculate_adx(&bars, 1);
        assert_eq!(series.value_at(1), Some(0.0));
    }

    #[test]
    fn adx_short_series() {
        let series = calculate_adx(&trending_up(4), 3);
        assert_eq!(series.len(), 4);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
