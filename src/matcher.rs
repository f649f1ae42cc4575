//! Matching engine core.
//!
//! A single entry point, [`Matcher::process`], dispatches incoming commands
//! to specialized hot paths per order type and time-in-force. All paths
//! share the same price-time tie-break: the book's price levels are strict
//! FIFO queues, so ties are always resolved by arrival order.

use crate::book::OrderBook;
use crate::decimal::{quote_amount, DecimalScale};
use crate::error::ValidationError;
use crate::ids::{AccountId, InstrumentId, OrderId, TradeId};
use crate::order::{Order, OrderStatus, OrderType, Side, TimeInForce};
use crate::trade::Trade;
use crate::trigger::TriggerPool;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A validated request to place a new order. Built by the caller (worker);
/// the matcher assigns no ids and owns no clock — both are passed in so the
/// matcher stays deterministic and test-friendly.
#[allow(clippy::too_many_arguments)]
pub struct PlaceOrderRequest {
    pub order_id: OrderId,
    pub client_order_id: Option<String>,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub base_amount: Decimal,
    pub time_in_force: TimeInForce,
}

/// A command understood by [`Matcher::process`].
pub enum Command {
    PlaceOrder(PlaceOrderRequest),
    CancelOrder(OrderId),
}

/// Result of processing one command: the affected orders' final states,
/// any trades produced, and any orders that were already sitting in the
/// trigger pool but fired as a direct consequence of this command.
#[derive(Default)]
pub struct ProcessOutcome {
    pub accepted: Option<Order>,
    pub trades: Vec<Trade>,
    pub maker_updates: Vec<Order>,
    pub triggered: Vec<Order>,
    pub rejected: Option<ValidationError>,
    pub cancelled: Option<Order>,
}

/// Everything the matcher needs to process one command against a single
/// instrument's state. Owned by the worker; borrowed for the duration of one
/// `process` call.
pub struct MatchContext<'a> {
    pub book: &'a mut OrderBook,
    pub orders: &'a mut HashMap<OrderId, Order>,
    pub trigger_pool: &'a mut TriggerPool,
    pub scale: &'a DecimalScale,
    pub reference_price: Decimal,
    pub now: u64,
}

/// Stateless matching core. All mutable state lives in the [`MatchContext`]
/// passed to each call, so a `Matcher` is `Send + Sync` trivially and can be
/// shared across instruments without synchronization of its own.
#[derive(Default)]
pub struct Matcher;

impl Matcher {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, command: Command, ctx: &mut MatchContext<'_>) -> ProcessOutcome {
        match command {
            Command::PlaceOrder(req) => self.place_order(req, ctx),
            Command::CancelOrder(order_id) => self.cancel_order(order_id, ctx),
        }
    }

    fn place_order(&self, req: PlaceOrderRequest, ctx: &mut MatchContext<'_>) -> ProcessOutcome {
        if let Err(e) = validate(&req, ctx.book.instrument_id(), ctx.scale) {
            return ProcessOutcome {
                rejected: Some(e),
                ..Default::default()
            };
        }

        let mut order = Order::new(
            req.order_id,
            req.client_order_id,
            req.account_id,
            req.instrument_id,
            req.side,
            req.order_type,
            req.limit_price,
            req.trigger_price,
            req.base_amount,
            req.time_in_force,
            ctx.now,
        );

        if order.order_type.is_stop_variant() && !is_triggered(&order, ctx.reference_price) {
            order.set_status(OrderStatus::WaitingTrigger, ctx.now);
            ctx.orders.insert(order.id, order.clone());
            let waiting = order.clone();
            ctx.trigger_pool.insert(order);
            return ProcessOutcome {
                accepted: Some(waiting),
                ..Default::default()
            };
        }

        self.run(order, ctx)
    }

    /// Runs an order (fresh, or just popped off the trigger pool) through the
    /// matching loop appropriate to its type and time-in-force.
    pub fn run(&self, mut order: Order, ctx: &mut MatchContext<'_>) -> ProcessOutcome {
        order.set_status(OrderStatus::New, ctx.now);
        ctx.orders.insert(order.id, order.clone());

        let mut trades = Vec::new();
        let mut maker_updates = Vec::new();

        match order.time_in_force {
            TimeInForce::FOK => {
                let bound = effective_bound(&order);
                let base = order.remaining;
                if !ctx.book.check_fok_liquidity(order.side, bound, base) {
                    order.set_status(OrderStatus::Cancelled, ctx.now);
                    ctx.orders.insert(order.id, order.clone());
                    return ProcessOutcome {
                        accepted: Some(order),
                        ..Default::default()
                    };
                }
                match_against_book(&mut order, ctx, Some(bound), &mut trades, &mut maker_updates);
                order.set_status(OrderStatus::Filled, ctx.now);
            }
            TimeInForce::IOC => {
                let bound = effective_bound(&order);
                match_against_book(&mut order, ctx, Some(bound), &mut trades, &mut maker_updates);
                order.set_status(final_ioc_status(&order), ctx.now);
            }
            TimeInForce::GTC => {
                if order.is_limit_like() {
                    let limit_price = order.limit_price.expect("GTC limit order needs a price");
                    match_against_book(&mut order, ctx, Some(limit_price), &mut trades, &mut maker_updates);
                    if order.remaining > Decimal::ZERO {
                        ctx.book
                            .add_resting(&order)
                            .expect("fresh order id cannot already be resting");
                        let status = if order.filled_base > Decimal::ZERO {
                            OrderStatus::PartiallyFilled
                        } else {
                            OrderStatus::New
                        };
                        order.set_status(status, ctx.now);
                    } else {
                        order.set_status(OrderStatus::Filled, ctx.now);
                    }
                } else {
                    // A GTC market order cannot rest; it behaves like IOC.
                    let bound = effective_bound(&order);
                    match_against_book(&mut order, ctx, Some(bound), &mut trades, &mut maker_updates);
                    order.set_status(final_ioc_status(&order), ctx.now);
                }
            }
        }

        ctx.orders.insert(order.id, order.clone());
        ProcessOutcome {
            accepted: Some(order),
            trades,
            maker_updates,
            ..Default::default()
        }
    }

    fn cancel_order(&self, order_id: OrderId, ctx: &mut MatchContext<'_>) -> ProcessOutcome {
        if ctx.book.cancel(order_id).is_ok() {
            if let Some(order) = ctx.orders.get_mut(&order_id) {
                let status = if order.filled_base > Decimal::ZERO {
                    OrderStatus::PartialFillCancelled
                } else {
                    OrderStatus::Cancelled
                };
                order.set_status(status, ctx.now);
                return ProcessOutcome {
                    cancelled: Some(order.clone()),
                    ..Default::default()
                };
            }
        }

        if let Some(mut order) = ctx.trigger_pool.remove(order_id) {
            order.set_status(OrderStatus::Cancelled, ctx.now);
            ctx.orders.insert(order.id, order.clone());
            return ProcessOutcome {
                cancelled: Some(order),
                ..Default::default()
            };
        }

        ProcessOutcome::default()
    }
}

/// True if a stop order's trigger condition already holds at `reference`.
fn is_triggered(order: &Order, reference: Decimal) -> bool {
    let trigger_price = order
        .trigger_price
        .expect("stop order must carry a trigger price");
    match order.side {
        Side::Bid => reference >= trigger_price,
        Side::Ask => reference <= trigger_price,
    }
}

/// The price bound a matching loop stops at: the order's own limit price for
/// limit-like orders, or an extreme bound for market-like orders so a market
/// order behaves as marketable against the entire opposite side.
fn effective_bound(order: &Order) -> Decimal {
    match order.limit_price {
        Some(p) => p,
        None => match order.side {
            Side::Bid => Decimal::MAX,
            Side::Ask => Decimal::ZERO,
        },
    }
}

/// Final status for an IOC/market order once matching stops: a marketable
/// order that finds no liquidity at all is `Cancelled`, not `Rejected` — it
/// was a valid order that simply never traded.
fn final_ioc_status(order: &Order) -> OrderStatus {
    if order.remaining <= Decimal::ZERO {
        OrderStatus::Filled
    } else if order.filled_base > Decimal::ZERO {
        OrderStatus::PartialFillCancelled
    } else {
        OrderStatus::Cancelled
    }
}

fn validate(
    req: &PlaceOrderRequest,
    book_instrument: InstrumentId,
    scale: &DecimalScale,
) -> Result<(), ValidationError> {
    if req.instrument_id != book_instrument {
        return Err(ValidationError::InstrumentMismatch {
            order_instrument: req.instrument_id,
            book_instrument,
        });
    }
    if req.base_amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }
    if !scale.fits_quantity(req.base_amount) {
        return Err(ValidationError::ScaleExceeded);
    }
    if req.order_type.requires_limit_price() {
        match req.limit_price {
            None => return Err(ValidationError::MissingLimitPrice),
            Some(p) if p < Decimal::ZERO => return Err(ValidationError::NegativePrice),
            Some(p) if !scale.fits_price(p) => return Err(ValidationError::ScaleExceeded),
            _ => {}
        }
    }
    if req.order_type.requires_trigger_price() {
        match req.trigger_price {
            None => return Err(ValidationError::MissingTriggerPrice),
            Some(p) if p < Decimal::ZERO => return Err(ValidationError::NegativePrice),
            Some(p) if !scale.fits_price(p) => return Err(ValidationError::ScaleExceeded),
            _ => {}
        }
    }
    Ok(())
}

/// Walks the opposite side of the book, filling `order` against successive
/// heads up to `bound` (inclusive), recording one [`Trade`] per fill and the
/// final state of each touched maker order.
fn match_against_book(
    order: &mut Order,
    ctx: &mut MatchContext<'_>,
    bound: Option<Decimal>,
    trades: &mut Vec<Trade>,
    maker_updates: &mut Vec<Order>,
) {
    loop {
        if order.remaining <= Decimal::ZERO {
            break;
        }
        let crosses = match bound {
            Some(b) => ctx.book.crosses(order.side, b),
            None => false,
        };
        if !crosses {
            break;
        }
        let opposite = order.side.opposite();
        let Some((price, maker_id, maker_remaining)) = ctx.book.peek_best(opposite) else {
            break;
        };
        let fill_base = order.remaining.min(maker_remaining);
        let fill_quote = quote_amount(fill_base, price, ctx.scale);

        let head_fill = ctx
            .book
            .fill_best_head(opposite, fill_base)
            .expect("peeked head must still be fillable");

        order.apply_fill(fill_base, fill_quote, ctx.now);

        if let Some(maker) = ctx.orders.get_mut(&maker_id) {
            maker.apply_fill(fill_base, fill_quote, ctx.now);
            let status = if head_fill.maker_fully_filled {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            maker.set_status(status, ctx.now);
            maker_updates.push(maker.clone());
        }

        trades.push(Trade {
            id: TradeId::new(),
            instrument_id: ctx.book.instrument_id(),
            maker_order_id: maker_id,
            taker_order_id: order.id,
            base_amount: fill_base,
            quote_amount: fill_quote,
            price,
            created_at: ctx.now,
        });
    }
}
