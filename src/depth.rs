//! Aggregated top-N depth view.
//!
//! Derived, not authoritative: rebuilt from the book's price levels after
//! every mutation that could change the top of book. Carries price, volume,
//! and order count per level so subscribers don't need to re-walk the book.

use crate::book::OrderBook;
use crate::order::Side;
use rust_decimal::Decimal;

/// One aggregated price level in a depth snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub volume: Decimal,
    pub order_count: usize,
}

/// Top-N bid/ask depth, rebuilt on demand from an [`OrderBook`].
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct DepthSnapshot {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// Rebuilds a top-`n` depth snapshot from `book`. O(n) in the requested depth,
/// not in book size, since `BTreeMap` iteration starts at the best price.
pub fn build_depth(book: &OrderBook, n: usize) -> DepthSnapshot {
    DepthSnapshot {
        bids: top_levels(book, Side::Bid, n),
        asks: top_levels(book, Side::Ask, n),
    }
}

fn top_levels(book: &OrderBook, side: Side, n: usize) -> Vec<DepthLevel> {
    let mut out = Vec::with_capacity(n);
    let mut price = match side {
        Side::Bid => book.best_bid(),
        Side::Ask => book.best_ask(),
    };
    while let Some(p) = price {
        if out.len() >= n {
            break;
        }
        let volume = book.volume_at(side, p);
        let order_count = book.orders_at(side, p);
        if order_count > 0 {
            out.push(DepthLevel {
                price: p,
                volume,
                order_count,
            });
        }
        price = next_price(book, side, p);
    }
    out
}

fn next_price(book: &OrderBook, side: Side, current: Decimal) -> Option<Decimal> {
    match side {
        Side::Bid => book.price_below(current),
        Side::Ask => book.price_above(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AccountId, InstrumentId, OrderId};
    use crate::order::{Order, OrderType, TimeInForce};
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
    fn depth_orders_bids_descending_and_asks_ascending() {
        let mut book = OrderBook::new(InstrumentId::new());
        book.add_resting(&resting(Side::Bid, dec!(99), dec!(1))).unwrap();
        book.add_resting(&resting(Side::Bid, dec!(101), dec!(1))).unwrap();
        book.add_resting(&resting(Side::Ask, dec!(103), dec!(1))).unwrap();
        book.add_resting(&resting(Side::Ask, dec!(102), dec!(1))).unwrap();

        let depth = build_depth(&book, 10);
        let bid_prices: Vec<Decimal> = depth.bids.iter().map(|l| l.price).collect();
        let ask_prices: Vec<Decimal> = depth.asks.iter().map(|l| l.price).collect();
        assert_eq!(bid_prices, vec![dec!(101), dec!(99)]);
        assert_eq!(ask_prices, vec![dec!(102), dec!(103)]);
    }

    #[test]
    fn depth_is_truncated_to_requested_n() {
        let mut book = OrderBook::new(InstrumentId::new());
        for p in [95, 96, 97, 98, 99].iter() {
            book.add_resting(&resting(Side::Bid, Decimal::from(*p), dec!(1)))
                .unwrap();
        }
        let depth = build_depth(&book, 2);
        assert_eq!(depth.bids.len(), 2);
        assert_eq!(depth.bids[0].price, dec!(99));
    }

    #[test]
    fn depth_level_aggregates_volume_and_count_at_a_price() {
        let mut book = OrderBook::new(InstrumentId::new());
        book.add_resting(&resting(Side::Bid, dec!(100), dec!(3))).unwrap();
        book.add_resting(&resting(Side::Bid, dec!(100), dec!(4))).unwrap();
        let depth = build_depth(&book, 10);
        assert_eq!(depth.bids[0].volume, dec!(7));
        assert_eq!(depth.bids[0].order_count, 2);
    }
}
