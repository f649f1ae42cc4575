//! Single-instrument order book: bid and ask sides, price-time priority.
//!
//! Each side is a price-indexed map of [`PriceLevel`]s; an order index maps
//! order id to (side, price, position hint) so cancel is a direct lookup
//! rather than a scan. Best bid/ask are cached and refreshed after every
//! mutation.

use crate::error::BookError;
use crate::ids::{InstrumentId, OrderId};
use crate::order::{Order, Side};
use crate::price_level::PriceLevel;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    side: Side,
    price: Decimal,
    position_hint: usize,
}

/// Outcome of filling the head order of the current best opposite level.
#[derive(Debug, Clone, Copy)]
pub struct HeadFill {
    pub maker_order_id: OrderId,
    pub price: Decimal,
    pub maker_fully_filled: bool,
}

/// A resting order, flattened for persistence/snapshot purposes.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RestingOrderSnapshot {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Decimal,
    pub remaining: Decimal,
}

/// Single-instrument limit order book.
pub struct OrderBook {
    instrument_id: InstrumentId,
    bids: BTreeMap<Decimal, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    index: HashMap<OrderId, IndexEntry>,
    best_bid: Option<Decimal>,
    best_ask: Option<Decimal>,
}

impl OrderBook {
    pub fn new(instrument_id: InstrumentId) -> Self {
        Self {
            instrument_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            best_bid: None,
            best_ask: None,
        }
    }

    pub fn instrument_id(&self) -> InstrumentId {
        self.instrument_id
    }

    fn side_map(&self, level_side: Side) -> &BTreeMap<Decimal, PriceLevel> {
        match level_side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_map_mut(&mut self, level_side: Side) -> &mut BTreeMap<Decimal, PriceLevel> {
        match level_side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    fn refresh_best_cache(&mut self) {
        self.best_bid = self.bids.keys().next_back().copied();
        self.best_ask = self.asks.keys().next().copied();
    }

    /// Inserts a not-fully-matched limit/stop-limit remainder at `order.limit_price`.
    pub fn add_resting(&mut self, order: &Order) -> Result<(), BookError> {
        if self.index.contains_key(&order.id) {
            return Err(BookError::DuplicateOrderId(order.id));
        }
        let price = order
            .limit_price
            .expect("resting order must carry a limit price");
        let map = self.side_map_mut(order.side);
        let level = map.entry(price).or_insert_with(|| PriceLevel::new(price));
        let position_hint = level.append(order.id, order.remaining);
        self.index.insert(
            order.id,
            IndexEntry {
                side: order.side,
                price,
                position_hint,
            },
        );
        self.refresh_best_cache();
        Ok(())
    }

    /// Removes a resting order by id. Returns its remaining quantity at cancel time.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<Decimal, BookError> {
        let entry = self
            .index
            .remove(&order_id)
            .ok_or(BookError::OrderNotFound(order_id))?;
        let map = self.side_map_mut(entry.side);
        let removed = {
            let level = map
                .get_mut(&entry.price)
                .ok_or(BookError::OrderNotFound(order_id))?;
            let removed = level
                .remove(order_id, entry.position_hint)
                .ok_or(BookError::OrderNotFound(order_id))?;
            let drop_level = level.is_empty();
            if drop_level {
                map.remove(&entry.price);
            }
            removed
        };
        self.refresh_best_cache();
        Ok(removed)
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.best_bid
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.best_ask
    }

    pub fn volume_at(&self, level_side: Side, price: Decimal) -> Decimal {
        self.side_map(level_side)
            .get(&price)
            .map(|l| l.total_volume())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn orders_at(&self, level_side: Side, price: Decimal) -> usize {
        self.side_map(level_side)
            .get(&price)
            .map(|l| l.count())
            .unwrap_or(0)
    }

    /// The next bid price below `price`, for walking the bid side best-first.
    pub fn price_below(&self, price: Decimal) -> Option<Decimal> {
        self.bids.range(..price).next_back().map(|(p, _)| *p)
    }

    /// The next ask price above `price`, for walking the ask side best-first.
    pub fn price_above(&self, price: Decimal) -> Option<Decimal> {
        self.asks
            .range((std::ops::Bound::Excluded(price), std::ops::Bound::Unbounded))
            .next()
            .map(|(p, _)| *p)
    }

    /// True if the opposite side's best price crosses `limit_price` for a
    /// taker on `taker_side`.
    pub fn crosses(&self, taker_side: Side, limit_price: Decimal) -> bool {
        match taker_side {
            Side::Bid => self.best_ask.is_some_and(|ask| ask <= limit_price),
            Side::Ask => self.best_bid.is_some_and(|bid| bid >= limit_price),
        }
    }

    /// Walks the opposite side up to `limit_price`, summing `remaining`, to
    /// decide whether `base` is fully coverable. Does not mutate state.
    pub fn check_fok_liquidity(&self, taker_side: Side, limit_price: Decimal, base: Decimal) -> bool {
        let mut total = Decimal::ZERO;
        match taker_side {
            Side::Bid => {
                for (&price, level) in self.asks.iter() {
                    if price > limit_price {
                        break;
                    }
                    total += level.total_volume();
                    if total >= base {
                        return true;
                    }
                }
            }
            Side::Ask => {
                for (&price, level) in self.bids.iter().rev() {
                    if price < limit_price {
                        break;
                    }
                    total += level.total_volume();
                    if total >= base {
                        return true;
                    }
                }
            }
        }
        total >= base
    }

    /// The head order of the current best level on `level_side`, without mutating.
    pub fn peek_best(&self, level_side: Side) -> Option<(Decimal, OrderId, Decimal)> {
        let (price, level) = match level_side {
            Side::Bid => self.bids.iter().next_back()?,
            Side::Ask => self.asks.iter().next()?,
        };
        let (order_id, remaining) = level.peek_front()?;
        Some((*price, order_id, remaining))
    }

    /// Fills `fill_qty` against the head order of the current best level on
    /// `level_side`. If the head is fully filled it is popped and removed
    /// from the index; an emptied level is dropped.
    pub fn fill_best_head(&mut self, level_side: Side, fill_qty: Decimal) -> Option<HeadFill> {
        let price = match level_side {
            Side::Bid => *self.bids.iter().next_back()?.0,
            Side::Ask => *self.asks.iter().next()?.0,
        };
        let map = self.side_map_mut(level_side);
        let level = map.get_mut(&price)?;
        let (maker_order_id, _) = level.peek_front()?;
        let maker_fully_filled = level.fill_front(fill_qty);
        if level.is_empty() {
            map.remove(&price);
        }
        if maker_fully_filled {
            self.index.remove(&maker_order_id);
        }
        self.refresh_best_cache();
        Some(HeadFill {
            maker_order_id,
            price,
            maker_fully_filled,
        })
    }

    pub fn has_resting_orders(&self) -> bool {
        !self.index.is_empty()
    }

    pub fn resting_order_count(&self) -> usize {
        self.index.len()
    }

    /// Sum of `remaining` across all resting orders on `level_side` — used by
    /// coherence checks, not the hot path.
    pub fn total_remaining(&self, level_side: Side) -> Decimal {
        self.side_map(level_side)
            .values()
            .map(|l| l.total_volume())
            .sum()
    }

    pub fn resting_orders_snapshot(&self) -> Vec<RestingOrderSnapshot> {
        let mut out = Vec::with_capacity(self.index.len());
        for level in self.bids.values() {
            for (order_id, remaining) in level.iter() {
                out.push(RestingOrderSnapshot {
                    order_id,
                    side: Side::Bid,
                    price: level.price(),
                    remaining,
                });
            }
        }
        for level in self.asks.values() {
            for (order_id, remaining) in level.iter() {
                out.push(RestingOrderSnapshot {
                    order_id,
                    side: Side::Ask,
                    price: level.price(),
                    remaining,
                });
            }
        }
        out
    }

    /// Checks the book/index coherence invariants. Not called on the hot
    /// path; used by the worker's paranoid check and by tests.
    pub fn check_invariants(&self) -> Result<(), crate::error::FatalError> {
        if let (Some(bid), Some(ask)) = (self.best_bid, self.best_ask) {
            if bid >= ask {
                return Err(crate::error::FatalError::CrossedBook {
                    best_bid: bid,
                    best_ask: ask,
                });
            }
        }
        for entry in self.index.values() {
            let map = self.side_map(entry.side);
            if !map.contains_key(&entry.price) {
                return Err(crate::error::FatalError::CacheDesync(format!(
                    "index references missing level at {}",
                    entry.price
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AccountId, OrderId};
    use crate::order::{OrderType, TimeInForce};
    use rust_decimal_macros::dec;

    fn resting(side: Side, price: Decimal, qty: Decimal) -> Order {
        Order::new(
            OrderId::new(),
            None,
            AccountId::new(),
            InstrumentId::new(),
            side,
            OrderType::Limit,
            Some(price),
            None,
            qty,
            TimeInForce::GTC,
            1,
        )
    }

    #[test]
    fn add_and_cancel_round_trips_to_empty_book() {
        let mut book = OrderBook::new(InstrumentId::new());
        let order = resting(Side::Bid, dec!(100), dec!(10));
        book.add_resting(&order).unwrap();
        assert_eq!(book.best_bid(), Some(dec!(100)));
        book.cancel(order.id).unwrap();
        assert!(book.best_bid().is_none());
        assert!(!book.has_resting_orders());
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut book = OrderBook::new(InstrumentId::new());
        let order = resting(Side::Bid, dec!(100), dec!(10));
        book.add_resting(&order).unwrap();
        let err = book.add_resting(&order).unwrap_err();
        assert_eq!(err, BookError::DuplicateOrderId(order.id));
    }

    #[test]
    fn cancel_unknown_order_errors() {
        let mut book = OrderBook::new(InstrumentId::new());
        let err = book.cancel(OrderId::new()).unwrap_err();
        assert!(matches!(err, BookError::OrderNotFound(_)));
    }

    #[test]
    fn best_prices_refresh_as_orders_are_added_and_removed() {
        let mut book = OrderBook::new(InstrumentId::new());
        let low = resting(Side::Bid, dec!(99), dec!(1));
        let high = resting(Side::Bid, dec!(101), dec!(1));
        book.add_resting(&low).unwrap();
        book.add_resting(&high).unwrap();
        assert_eq!(book.best_bid(), Some(dec!(101)));
        book.cancel(high.id).unwrap();
        assert_eq!(book.best_bid(), Some(dec!(99)));
    }

    #[test]
    fn fill_best_head_pops_fully_filled_maker_and_drops_empty_level() {
        let mut book = OrderBook::new(InstrumentId::new());
        let ask = resting(Side::Ask, dec!(100), dec!(5));
        book.add_resting(&ask).unwrap();
        let fill = book.fill_best_head(Side::Ask, dec!(5)).unwrap();
        assert_eq!(fill.maker_order_id, ask.id);
        assert!(fill.maker_fully_filled);
        assert!(book.best_ask().is_none());
        assert!(!book.has_resting_orders());
    }

    #[test]
    fn fill_best_head_partial_keeps_maker_resting() {
        let mut book = OrderBook::new(InstrumentId::new());
        let ask = resting(Side::Ask, dec!(100), dec!(5));
        book.add_resting(&ask).unwrap();
        let fill = book.fill_best_head(Side::Ask, dec!(2)).unwrap();
        assert!(!fill.maker_fully_filled);
        assert_eq!(book.volume_at(Side::Ask, dec!(100)), dec!(3));
    }

    #[test]
    fn check_fok_liquidity_sums_across_levels_up_to_bound() {
        let mut book = OrderBook::new(InstrumentId::new());
        book.add_resting(&resting(Side::Ask, dec!(100), dec!(4))).unwrap();
        book.add_resting(&resting(Side::Ask, dec!(101), dec!(5))).unwrap();
        assert!(!book.check_fok_liquidity(Side::Bid, dec!(101), dec!(10)));
        assert!(book.check_fok_liquidity(Side::Bid, dec!(101), dec!(9)));
    }

    #[test]
    fn crosses_detects_marketable_taker() {
        let mut book = OrderBook::new(InstrumentId::new());
        book.add_resting(&resting(Side::Ask, dec!(100), dec!(4))).unwrap();
        assert!(book.crosses(Side::Bid, dec!(100)));
        assert!(!book.crosses(Side::Bid, dec!(99)));
    }

    #[test]
    fn invariants_hold_on_well_formed_book() {
        let mut book = OrderBook::new(InstrumentId::new());
        book.add_resting(&resting(Side::Bid, dec!(99), dec!(1))).unwrap();
        book.add_resting(&resting(Side::Ask, dec!(101), dec!(1))).unwrap();
        assert!(book.check_invariants().is_ok());
    }
}
