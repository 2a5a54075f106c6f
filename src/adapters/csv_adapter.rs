//! CSV file data adapter.
//!
//! One file per symbol, `<data_dir>/<SYMBOL>.csv`, with the header
//! `timestamp,open,high,low,close,volume`. Rows come back in file order.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::domain::error::PapertraderError;
use crate::domain::ohlcv::{Bar, parse_timestamp};
use crate::ports::data_port::DataPort;

#[derive(Debug, Deserialize)]
struct BarRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, PapertraderError> {
        let path = self.csv_path(symbol);
        if !path.is_file() {
            return Err(PapertraderError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| PapertraderError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;

        let mut bars = Vec::new();
        for (row, result) in rdr.deserialize::<BarRecord>().enumerate() {
            let record = result.map_err(|e| PapertraderError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let timestamp =
                parse_timestamp(&record.timestamp).ok_or_else(|| PapertraderError::InvalidBar {
                    index: row,
                    reason: format!("unrecognised timestamp {:?}", record.timestamp),
                })?;

            bars.push(Bar {
                timestamp,
                open: record.open,
                high: record.high,
                low: record.low,
                close: record.close,
                volume: record.volume,
            });
        }

        debug!(symbol, bars = bars.len(), path = %path.display(), "loaded bars");
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PapertraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| PapertraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if let (true, Some(stem)) = (is_csv, path.file_stem()) {
                symbols.push(stem.to_string_lossy().into_owned());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
