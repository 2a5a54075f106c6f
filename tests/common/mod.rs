#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use papertrader::domain::backtest::BacktestConfig;
use papertrader::domain::error::PapertraderError;
pub use papertrader::domain::ohlcv::Bar;
use papertrader::domain::strategy::StrategyConfig;
use papertrader::domain::trade::TradeEvent;
use papertrader::ports::data_port::DataPort;
use papertrader::ports::execution_port::{ExecutionPort, OrderAck};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, PapertraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PapertraderError::Data {
                reason: reason.clone(),
            });
        }
        self.data
            .get(symbol)
            .cloned()
            .ok_or_else(|| PapertraderError::NoData {
                symbol: symbol.to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, PapertraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Records every submission; rejects from the `reject_from`-th one onwards.
#[derive(Default)]
pub struct MockExecutionPort {
    pub submitted: Vec<TradeEvent>,
    pub reject_from: Option<usize>,
}

impl MockExecutionPort {
    pub fn rejecting_from(n: usize) -> Self {
        Self {
            submitted: Vec::new(),
            reject_from: Some(n),
        }
    }
}

impl ExecutionPort for MockExecutionPort {
    fn submit(&mut self, event: &TradeEvent) -> Result<OrderAck, PapertraderError> {
        if self.reject_from.is_some_and(|n| self.submitted.len() >= n) {
            return Err(PapertraderError::Execution {
                reason: "mock venue rejected order".into(),
            });
        }
        self.submitted.push(event.clone());
        Ok(OrderAck {
            order_id: self.submitted.len() as u64,
            filled_price: event.price,
        })
    }
}

pub fn ts(hour: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hour as i64)
}

/// Hourly bars opening at the previous close, with half a point of wick on
/// each side.
pub fn make_bars(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: ts(i),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: volumes.get(i).copied().unwrap_or(1000.0),
            }
        })
        .collect()
}

/// 21 flat bars at 100, then 30 bars zig-zagging up to ~140 with a volume
/// surge on the first eight rising bars.
pub fn breakout_bars() -> Vec<Bar> {
    let mut closes = vec![100.0; 21];
    let mut close = 100.0;
    for k in 0..30 {
        close += if k % 2 == 0 { 3.0 } else { -0.333 };
        closes.push(close);
    }
    let volumes: Vec<f64> = (0..closes.len())
        .map(|i| if (21..=28).contains(&i) { 3000.0 } else { 1000.0 })
        .collect();
    make_bars(&closes, &volumes)
}

/// Defaults with the RSI gates opened so a trending series can qualify.
pub fn relaxed_strategy() -> StrategyConfig {
    StrategyConfig {
        name: "relaxed".into(),
        rsi_oversold: 100.0,
        rsi_overbought: 100.0,
        ..StrategyConfig::default()
    }
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        initial_capital: 10_000.0,
        position_size: 1.0,
        commission_pct: 0.0,
    }
}

pub fn bars_to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.to_rfc3339(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    out
}
