//! Report output port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PapertraderError;

/// Port for writing backtest results.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), PapertraderError>;

    /// Default implementation: one `write` per result with the symbol
    /// inserted before the file extension.
    fn write_many(
        &self,
        results: &[BacktestResult],
        output_path: &str,
    ) -> Result<(), PapertraderError> {
        if let [single] = results {
            return self.write(single, output_path);
        }
        for result in results {
            self.write(result, &per_symbol_path(output_path, &result.symbol))?;
        }
        Ok(())
    }
}

/// `out/report.json` + `BTC` -> `out/report_BTC.json`.
pub fn per_symbol_path(output_path: &str, symbol: &str) -> String {
    let path = std::path::Path::new(output_path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}_{symbol}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{symbol}"),
    };
    path.with_file_name(file_name).to_string_lossy().into_owned()
}
