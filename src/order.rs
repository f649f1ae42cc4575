//! Core order types and the order lifecycle.
//!
//! [`Order`], [`Side`], [`OrderType`], and [`TimeInForce`] define the order
//! message; [`OrderStatus`] defines its lifecycle. Orders are created by the
//! matcher on command intake and mutated only by the worker that owns their
//! instrument.

use crate::ids::{AccountId, InstrumentId, OrderId};
use rust_decimal::Decimal;

/// Order side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

/// Order type: limit (resting, priced), market (immediate, unpriced), or a
/// dormant stop variant that becomes one of the above once triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    StopLimit,
}

impl OrderType {
    pub fn requires_limit_price(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_trigger_price(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }

    pub fn is_stop_variant(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

/// Time-in-force: how long the order stays eligible to match or rest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TimeInForce {
    /// Good-Till-Cancelled: rests on the book until filled or cancelled.
    GTC,
    /// Immediate-or-Cancel: fills what it can immediately; cancels the rest.
    IOC,
    /// Fill-or-Kill: fills entirely immediately, or is cancelled with no trades.
    FOK,
}

/// Order lifecycle status. Terminal states are
/// `Filled`, `Cancelled`, `PartialFillCancelled`, and `Rejected`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderStatus {
    PendingNew,
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    PartialFillCancelled,
    Rejected,
    WaitingTrigger,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::PartialFillCancelled
                | OrderStatus::Rejected
        )
    }
}

/// An order message and its mutable lifecycle state.
///
/// Invariant: `filled_base + remaining == base_amount` holds at every
/// observable moment; `filled_base` and `filled_quote` are monotonically
/// non-decreasing.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_order_id: Option<String>,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub base_amount: Decimal,
    pub remaining: Decimal,
    pub filled_base: Decimal,
    pub filled_quote: Decimal,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Order {
    /// Builds a fresh, unprocessed order: `remaining == base_amount`, no fills yet.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        client_order_id: Option<String>,
        account_id: AccountId,
        instrument_id: InstrumentId,
        side: Side,
        order_type: OrderType,
        limit_price: Option<Decimal>,
        trigger_price: Option<Decimal>,
        base_amount: Decimal,
        time_in_force: TimeInForce,
        timestamp: u64,
    ) -> Self {
        Self {
            id,
            client_order_id,
            account_id,
            instrument_id,
            side,
            order_type,
            limit_price,
            trigger_price,
            base_amount,
            remaining: base_amount,
            filled_base: Decimal::ZERO,
            filled_quote: Decimal::ZERO,
            status: OrderStatus::PendingNew,
            time_in_force,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn is_limit_like(&self) -> bool {
        matches!(self.order_type, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn is_market_like(&self) -> bool {
        matches!(self.order_type, OrderType::Market | OrderType::Stop)
    }

    /// Applies one fill against this order: advances `filled_base`/`filled_quote`,
    /// shrinks `remaining`. Does not touch `status` — callers decide the
    /// resulting status from context (taker vs. maker, TIF).
    pub fn apply_fill(&mut self, fill_base: Decimal, fill_quote: Decimal, timestamp: u64) {
        self.filled_base += fill_base;
        self.filled_quote += fill_quote;
        self.remaining -= fill_base;
        if self.remaining < Decimal::ZERO {
            self.remaining = Decimal::ZERO;
        }
        self.updated_at = timestamp;
    }

    pub fn set_status(&mut self, status: OrderStatus, timestamp: u64) {
        self.status = status;
        self.updated_at = timestamp;
    }

    pub fn is_fully_filled(&self) -> bool {
        self.remaining <= Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_order() -> Order {
        Order::new(
            OrderId::new(),
            None,
            AccountId::new(),
            InstrumentId::new(),
            Side::Bid,
            OrderType::Limit,
            Some(dec!(100)),
            None,
            dec!(10),
            TimeInForce::GTC,
            1,
        )
    }

    #[test]
    fn new_order_has_full_remaining_and_no_fills() {
        let order = sample_order();
        assert_eq!(order.remaining, order.base_amount);
        assert_eq!(order.filled_base, Decimal::ZERO);
        assert_eq!(order.status, OrderStatus::PendingNew);
    }

    #[test]
    fn apply_fill_preserves_conservation_invariant() {
        let mut order = sample_order();
        order.apply_fill(dec!(4), dec!(400), 2);
        assert_eq!(order.filled_base + order.remaining, order.base_amount);
        order.apply_fill(dec!(6), dec!(600), 3);
        assert_eq!(order.filled_base + order.remaining, order.base_amount);
        assert!(order.is_fully_filled());
    }

    #[test]
    fn order_type_requires_the_right_prices_per_type() {
        assert!(OrderType::Limit.requires_limit_price());
        assert!(OrderType::StopLimit.requires_limit_price());
        assert!(!OrderType::Market.requires_limit_price());
        assert!(OrderType::Stop.requires_trigger_price());
        assert!(OrderType::StopLimit.requires_trigger_price());
        assert!(!OrderType::Limit.requires_trigger_price());
    }

    #[test]
    fn terminal_statuses_are_exactly_the_documented_set() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::PartialFillCancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(!OrderStatus::WaitingTrigger.is_terminal());
        assert!(!OrderStatus::PendingNew.is_terminal());
    }
}
