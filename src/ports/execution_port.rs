//! Order execution port trait.

use serde::Serialize;

use crate::domain::error::PapertraderError;
use crate::domain::trade::TradeEvent;

/// Acknowledgement returned by the execution venue for one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAck {
    pub order_id: u64,
    pub filled_price: f64,
}

/// Sink for trade commands. Every `TradeEvent` the engine emits is sent once;
/// a rejection is surfaced as `PapertraderError::Execution` and never retried
/// here. Reconciliation belongs to the implementor.
pub trait ExecutionPort {
    fn submit(&mut self, event: &TradeEvent) -> Result<OrderAck, PapertraderError>;
}
