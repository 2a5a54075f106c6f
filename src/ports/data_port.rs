//! Data access port trait.

use crate::domain::error::PapertraderError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// All bars for `symbol`, in source order. Ordering is checked by the
    /// caller's validation, not fixed up here.
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, PapertraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, PapertraderError>;
}
