//! Stop/stop-limit trigger pool.
//!
//! Dormant stop orders sit here keyed by (side, trigger price) until the
//! reference price makes them eligible. Eligible orders drain
//! closest-trigger-price-first, then strict arrival order within a price —
//! the same tie-break rule the book itself uses.

use crate::ids::OrderId;
use crate::order::{Order, Side};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};

/// Pool of dormant stop/stop-limit orders awaiting trigger.
pub struct TriggerPool {
    /// Stop orders on the bid side trigger when the reference price rises to
    /// meet or exceed their trigger price.
    bid_stops: BTreeMap<Decimal, VecDeque<Order>>,
    /// Stop orders on the ask side trigger when the reference price falls to
    /// meet or undercut their trigger price.
    ask_stops: BTreeMap<Decimal, VecDeque<Order>>,
    len: usize,
}

impl TriggerPool {
    pub fn new() -> Self {
        Self {
            bid_stops: BTreeMap::new(),
            ask_stops: BTreeMap::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, order: Order) {
        let trigger_price = order
            .trigger_price
            .expect("stop order must carry a trigger price");
        let map = match order.side {
            Side::Bid => &mut self.bid_stops,
            Side::Ask => &mut self.ask_stops,
        };
        map.entry(trigger_price).or_default().push_back(order);
        self.len += 1;
    }

    /// Drains every order whose trigger condition holds against `reference`,
    /// ordered closest-trigger-price-first then by arrival within a price.
    ///
    /// Bid stops are eligible once the reference price has risen to meet or
    /// pass their trigger (trigger <= reference); they drain starting at the
    /// reference and descending to the lowest eligible trigger. Ask stops are
    /// eligible once the reference has fallen to meet or pass their trigger
    /// (trigger >= reference); they drain starting at the reference and
    /// ascending to the highest eligible trigger. Either way, the closest
    /// trigger to the reference price drains first.
    pub fn drain_eligible(&mut self, reference: Decimal) -> Vec<Order> {
        let mut out = Vec::new();

        let eligible_bid_prices: Vec<Decimal> =
            self.bid_stops.range(..=reference).map(|(p, _)| *p).rev().collect();
        for price in eligible_bid_prices {
            if let Some(queue) = self.bid_stops.remove(&price) {
                self.len -= queue.len();
                out.extend(queue);
            }
        }

        let eligible_ask_prices: Vec<Decimal> =
            self.ask_stops.range(reference..).map(|(p, _)| *p).collect();
        for price in eligible_ask_prices {
            if let Some(queue) = self.ask_stops.remove(&price) {
                self.len -= queue.len();
                out.extend(queue);
            }
        }

        out
    }

    /// Removes a still-dormant stop order by id. Cancel of a `WaitingTrigger`
    /// order is rare enough that a linear scan across both maps is fine.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        for map in [&mut self.bid_stops, &mut self.ask_stops] {
            for queue in map.values_mut() {
                if let Some(pos) = queue.iter().position(|o| o.id == order_id) {
                    let order = queue.remove(pos);
                    if order.is_some() {
                        self.len -= 1;
                    }
                    return order;
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Default for TriggerPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AccountId, InstrumentId, OrderId};
    use crate::order::{OrderType, TimeInForce};
    use rust_decimal_macros::dec;

    fn stop(side: Side, trigger: Decimal, created_at: u64) -> Order {
        Order::new(
            OrderId::new(),
            None,
            AccountId::new(),
            InstrumentId::new(),
            side,
            OrderType::Stop,
            None,
            Some(trigger),
            dec!(1),
            TimeInForce::GTC,
            created_at,
        )
    }

    #[test]
    fn bid_stops_drain_descending_from_highest_eligible_down_to_reference() {
        let mut pool = TriggerPool::new();
        pool.insert(stop(Side::Bid, dec!(100), 1));
        pool.insert(stop(Side::Bid, dec!(102), 2));
        pool.insert(stop(Side::Bid, dec!(105), 3));
        let drained = pool.drain_eligible(dec!(102));
        let prices: Vec<Decimal> = drained.iter().map(|o| o.trigger_price.unwrap()).collect();
        assert_eq!(prices, vec![dec!(102), dec!(100)]);
        assert!(pool.is_empty() == false);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn ask_stops_drain_ascending_from_the_reference_up_to_the_highest_eligible() {
        let mut pool = TriggerPool::new();
        pool.insert(stop(Side::Ask, dec!(100), 1));
        pool.insert(stop(Side::Ask, dec!(98), 2));
        pool.insert(stop(Side::Ask, dec!(95), 3));
        let drained = pool.drain_eligible(dec!(98));
        let prices: Vec<Decimal> = drained.iter().map(|o| o.trigger_price.unwrap()).collect();
        assert_eq!(prices, vec![dec!(98), dec!(100)]);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn arrival_order_preserved_within_same_trigger_price() {
        let mut pool = TriggerPool::new();
        let first = stop(Side::Bid, dec!(100), 1);
        let second = stop(Side::Bid, dec!(100), 2);
        let first_id = first.id;
        let second_id = second.id;
        pool.insert(first);
        pool.insert(second);
        let drained = pool.drain_eligible(dec!(100));
        assert_eq!(drained[0].id, first_id);
        assert_eq!(drained[1].id, second_id);
    }

    #[test]
    fn remove_takes_a_dormant_order_out_of_its_queue() {
        let mut pool = TriggerPool::new();
        let order = stop(Side::Bid, dec!(100), 1);
        let id = order.id;
        pool.insert(order);
        let removed = pool.remove(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(pool.is_empty());
        assert!(pool.remove(id).is_none());
    }

    #[test]
    fn nothing_drains_when_no_trigger_is_eligible() {
        let mut pool = TriggerPool::new();
        pool.insert(stop(Side::Bid, dec!(105), 1));
        pool.insert(stop(Side::Ask, dec!(95), 2));
        let drained = pool.drain_eligible(dec!(100));
        assert!(drained.is_empty());
        assert_eq!(pool.len(), 2);
    }
}
