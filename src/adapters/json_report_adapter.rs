//! JSON report adapter implementing ReportPort.
//!
//! Writes the whole `BacktestResult` (statistics, trade log, round trips and
//! equity curve) as pretty-printed JSON.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PapertraderError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        JsonReportAdapter
    }

    pub fn render(result: &BacktestResult) -> Result<String, PapertraderError> {
        serde_json::to_string_pretty(result).map_err(|e| PapertraderError::Report {
            reason: format!("failed to serialize result for {}: {}", result.symbol, e),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), PapertraderError> {
        let json = Self::render(result)?;

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;

        info!(symbol = %result.symbol, path = output_path, "wrote JSON report");
        Ok(())
    }
}
