//! Time-ordered sequence of resting orders at a single price.
//!
//! Appending is O(1) amortized. Removal is driven by a position hint carried
//! in the book's order index: when the hint is still accurate (the common
//! case — nothing else at this level has been removed since) it is O(1);
//! otherwise the level falls back to a linear scan, which is the documented
//! worst case.

use crate::ids::OrderId;
use rust_decimal::Decimal;
use std::collections::VecDeque;

#[derive(Clone, Debug)]
struct RestingSlot {
    order_id: OrderId,
    remaining: Decimal,
}

/// FIFO queue of resting orders at one price, with cached aggregate volume.
#[derive(Clone, Debug)]
pub struct PriceLevel {
    price: Decimal,
    orders: VecDeque<RestingSlot>,
    total_volume: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_volume: Decimal::ZERO,
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Appends a resting order to the tail. Returns its position hint.
    pub fn append(&mut self, order_id: OrderId, remaining: Decimal) -> usize {
        self.orders.push_back(RestingSlot {
            order_id,
            remaining,
        });
        self.total_volume += remaining;
        self.orders.len() - 1
    }

    /// The order at the head of the queue (earliest arrival), if any.
    pub fn peek_front(&self) -> Option<(OrderId, Decimal)> {
        self.orders.front().map(|s| (s.order_id, s.remaining))
    }

    /// Reduces the head order's remaining quantity by `fill_qty`. Pops it if
    /// fully filled. Returns `true` if the head was popped.
    ///
    /// Partial fills on the head do not change its position, per contract.
    pub fn fill_front(&mut self, fill_qty: Decimal) -> bool {
        let Some(front) = self.orders.front_mut() else {
            return false;
        };
        front.remaining -= fill_qty;
        self.total_volume -= fill_qty;
        if front.remaining <= Decimal::ZERO {
            self.orders.pop_front();
            true
        } else {
            false
        }
    }

    /// Removes an order by id, using `position_hint` as the likely index.
    /// Returns the removed order's remaining quantity, or `None` if absent.
    pub fn remove(&mut self, order_id: OrderId, position_hint: usize) -> Option<Decimal> {
        let idx = match self.orders.get(position_hint) {
            Some(slot) if slot.order_id == order_id => position_hint,
            _ => self.orders.iter().position(|s| s.order_id == order_id)?,
        };
        let slot = self.orders.remove(idx)?;
        self.total_volume -= slot.remaining;
        Some(slot.remaining)
    }

    /// Iterates resting orders in strict arrival (FIFO) order.
    pub fn iter(&self) -> impl Iterator<Item = (OrderId, Decimal)> + '_ {
        self.orders.iter().map(|s| (s.order_id, s.remaining))
    }

    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    pub fn count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn append_updates_cached_volume_and_count() {
        let mut level = PriceLevel::new(dec!(100));
        level.append(OrderId::new(), dec!(1));
        level.append(OrderId::new(), dec!(2));
        assert_eq!(level.total_volume(), dec!(3));
        assert_eq!(level.count(), 2);
    }

    #[test]
    fn fill_front_partial_does_not_change_position() {
        let mut level = PriceLevel::new(dec!(100));
        let a = OrderId::new();
        let b = OrderId::new();
        level.append(a, dec!(5));
        level.append(b, dec!(5));
        let popped = level.fill_front(dec!(2));
        assert!(!popped);
        assert_eq!(level.peek_front(), Some((a, dec!(3))));
        assert_eq!(level.total_volume(), dec!(8));
    }

    #[test]
    fn fill_front_full_pops_head() {
        let mut level = PriceLevel::new(dec!(100));
        let a = OrderId::new();
        let b = OrderId::new();
        level.append(a, dec!(5));
        level.append(b, dec!(5));
        let popped = level.fill_front(dec!(5));
        assert!(popped);
        assert_eq!(level.peek_front(), Some((b, dec!(5))));
        assert_eq!(level.count(), 1);
    }

    #[test]
    fn remove_with_stale_hint_falls_back_to_scan() {
        let mut level = PriceLevel::new(dec!(100));
        let a = OrderId::new();
        let b = OrderId::new();
        let c = OrderId::new();
        level.append(a, dec!(1));
        level.append(b, dec!(2));
        level.append(c, dec!(3));
        // Remove b first; c's hint (2) is now stale (c actually sits at index 1).
        level.remove(b, 1).unwrap();
        let removed = level.remove(c, 2);
        assert_eq!(removed, Some(dec!(3)));
        assert_eq!(level.total_volume(), dec!(1));
    }

    #[test]
    fn ties_are_strictly_fifo() {
        let mut level = PriceLevel::new(dec!(100));
        let a = OrderId::new();
        let b = OrderId::new();
        let c = OrderId::new();
        level.append(a, dec!(1));
        level.append(b, dec!(1));
        level.append(c, dec!(1));
        let order: Vec<OrderId> = level.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b, c]);
    }
}
