//! Trade record.
//!
//! Emitted once per match between a resting maker order and the taker order
//! being processed.

use crate::ids::{InstrumentId, OrderId, TradeId};
use rust_decimal::Decimal;

/// One match between a maker (resting) order and a taker (incoming) order.
///
/// Invariant: `quote_amount == base_amount * price` under the instrument's
/// declared rounding rule (see [`crate::decimal::quote_amount`]).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub instrument_id: InstrumentId,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub base_amount: Decimal,
    pub quote_amount: Decimal,
    pub price: Decimal,
    pub created_at: u64,
}
