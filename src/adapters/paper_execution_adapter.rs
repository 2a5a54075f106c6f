//! In-memory execution venue for paper trading.
//!
//! Every command is acknowledged at the event's own price and recorded.

use tracing::info;

use crate::domain::error::PapertraderError;
use crate::domain::trade::TradeEvent;
use crate::ports::execution_port::{ExecutionPort, OrderAck};

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub ack: OrderAck,
    pub event: TradeEvent,
}

#[derive(Debug, Default)]
pub struct PaperExecutionAdapter {
    next_order_id: u64,
    fills: Vec<Fill>,
}

impl PaperExecutionAdapter {
    pub fn new() -> Self {
        PaperExecutionAdapter {
            next_order_id: 1,
            fills: Vec::new(),
        }
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }
}

impl ExecutionPort for PaperExecutionAdapter {
    fn submit(&mut self, event: &TradeEvent) -> Result<OrderAck, PapertraderError> {
        if !event.price.is_finite() || event.price <= 0.0 {
            return Err(PapertraderError::Execution {
                reason: format!("refusing fill at price {}", event.price),
            });
        }

        let ack = OrderAck {
            order_id: self.next_order_id.max(1),
            filled_price: event.price,
        };
        self.next_order_id = ack.order_id + 1;

        info!(
            order_id = ack.order_id,
            symbol = %event.symbol,
            side = %event.side,
            price = event.price,
            size_fraction = event.size_fraction,
            reason = %event.reason,
            "paper fill"
        );
        self.fills.push(Fill {
            ack: ack.clone(),
            event: event.clone(),
        });
        Ok(ack)
    }
}
