//! CSV trade-log adapter implementing ReportPort.
//!
//! One row per `TradeEvent`, in emission order.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PapertraderError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct CsvTradeAdapter;

impl CsvTradeAdapter {
    pub fn new() -> Self {
        CsvTradeAdapter
    }
}

fn csv_error(path: &str, e: csv::Error) -> PapertraderError {
    PapertraderError::Report {
        reason: format!("failed to write trade log {path}: {e}"),
    }
}

impl ReportPort for CsvTradeAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), PapertraderError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(output_path, e))?;
        // serde's csv writer only emits a header once it sees a record
        if result.trades.is_empty() {
            wtr.write_record([
                "symbol",
                "timestamp",
                "side",
                "price",
                "size_fraction",
                "reason",
                "profit_pct",
            ])
            .map_err(|e| csv_error(output_path, e))?;
        }
        for event in &result.trades {
            wtr.serialize(event).map_err(|e| csv_error(output_path, e))?;
        }
        wtr.flush()?;

        info!(
            symbol = %result.symbol,
            trades = result.trades.len(),
            path = output_path,
            "wrote trade log"
        );
        Ok(())
    }
}
