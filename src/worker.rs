//! Single-threaded per-instrument executor.
//!
//! Each `EngineWorker` owns one instrument's book, order registry, trigger
//! pool, and reference price outright — no cross-worker locks are ever
//! taken. Commands arrive over a bounded `crossbeam-channel` queue and are
//! processed one at a time on the worker's own thread; callers talk to it
//! through a [`WorkerHandle`].

use crate::book::OrderBook;
use crate::config::InstrumentConfig;
use crate::decimal::DecimalScale;
use crate::depth::{self, DepthSnapshot};
use crate::error::{CommandError, DomainError, InfraError};
use crate::event::{now_millis, EventBus, EventKind};
use crate::ids::{InstrumentId, OrderId};
use crate::matcher::{Command, MatchContext, Matcher, PlaceOrderRequest, ProcessOutcome};
use crate::order::{Order, OrderStatus};
use crate::trigger::TriggerPool;
use crossbeam_channel::{bounded, Sender};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::thread::JoinHandle;
use std::time::Duration;

/// Worker lifecycle state. Transitions: `Running` <-> `Halted` via explicit
/// admin commands; `Running` -> `Faulted` only once, on a detected invariant
/// violation, and never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WorkerState {
    Running,
    Halted,
    Faulted,
}

/// Point-in-time view of a worker, returned by a status query.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct WorkerStatus {
    pub instrument_id: InstrumentId,
    pub state: WorkerState,
    pub resting_order_count: usize,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub reference_price: Option<Decimal>,
    pub pending_triggers: usize,
}

/// A point-in-time dump of a worker's book, suitable for persistence.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct WorkerSnapshot {
    pub instrument_id: InstrumentId,
    pub state: WorkerState,
    pub reference_price: Option<Decimal>,
    pub resting_orders: Vec<crate::book::RestingOrderSnapshot>,
}

enum WorkerMessage {
    Submit(PlaceOrderRequest, Sender<Result<Order, CommandError>>),
    Cancel(OrderId, Sender<Result<Order, CommandError>>),
    Halt(Sender<()>),
    Resume(Sender<()>),
    Status(Sender<WorkerStatus>),
    Snapshot(Sender<WorkerSnapshot>),
    Depth(usize, Sender<DepthSnapshot>),
    Stop,
}

/// A handle to a running worker's thread and command queue. Cloning is
/// cheap; all clones share the same underlying channel and thread.
#[derive(Clone)]
pub struct WorkerHandle {
    instrument_id: InstrumentId,
    sender: Sender<WorkerMessage>,
}

impl WorkerHandle {
    pub fn instrument_id(&self) -> InstrumentId {
        self.instrument_id
    }

    pub fn submit(&self, request: PlaceOrderRequest) -> Result<Order, CommandError> {
        let (tx, rx) = bounded(1);
        self.send(WorkerMessage::Submit(request, tx))?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))?
    }

    /// Like [`Self::submit`], but bounds the enqueue step: if the worker's
    /// command queue is still full after `timeout`, returns `Timeout`
    /// instead of blocking indefinitely.
    pub fn submit_with_timeout(&self, request: PlaceOrderRequest, timeout: Duration) -> Result<Order, CommandError> {
        let (tx, rx) = bounded(1);
        self.send_with_timeout(WorkerMessage::Submit(request, tx), timeout)?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))?
    }

    pub fn cancel(&self, order_id: OrderId) -> Result<Order, CommandError> {
        let (tx, rx) = bounded(1);
        self.send(WorkerMessage::Cancel(order_id, tx))?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))?
    }

    /// Like [`Self::cancel`], but bounds the enqueue step with `timeout`.
    pub fn cancel_with_timeout(&self, order_id: OrderId, timeout: Duration) -> Result<Order, CommandError> {
        let (tx, rx) = bounded(1);
        self.send_with_timeout(WorkerMessage::Cancel(order_id, tx), timeout)?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))?
    }

    pub fn halt(&self) -> Result<(), CommandError> {
        let (tx, rx) = bounded(1);
        self.send(WorkerMessage::Halt(tx))?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))
    }

    pub fn resume(&self) -> Result<(), CommandError> {
        let (tx, rx) = bounded(1);
        self.send(WorkerMessage::Resume(tx))?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))
    }

    pub fn status(&self) -> Result<WorkerStatus, CommandError> {
        let (tx, rx) = bounded(1);
        self.send(WorkerMessage::Status(tx))?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))
    }

    pub fn snapshot(&self) -> Result<WorkerSnapshot, CommandError> {
        let (tx, rx) = bounded(1);
        self.send(WorkerMessage::Snapshot(tx))?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))
    }

    /// Fetches an aggregated top-`n` depth view of the current book.
    pub fn depth(&self, n: usize) -> Result<DepthSnapshot, CommandError> {
        let (tx, rx) = bounded(1);
        self.send(WorkerMessage::Depth(n, tx))?;
        rx.recv().map_err(|_| CommandError::from(InfraError::ChannelClosed))
    }

    pub fn stop(&self) {
        let _ = self.sender.send(WorkerMessage::Stop);
    }

    fn send(&self, msg: WorkerMessage) -> Result<(), CommandError> {
        self.sender.try_send(msg).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => CommandError::from(InfraError::ChannelFull),
            crossbeam_channel::TrySendError::Disconnected(_) => {
                CommandError::from(InfraError::ChannelClosed)
            }
        })
    }

    /// Blocks the caller up to `timeout` for room in the command queue,
    /// rather than failing immediately on a full queue.
    fn send_with_timeout(&self, msg: WorkerMessage, timeout: Duration) -> Result<(), CommandError> {
        self.sender.send_timeout(msg, timeout).map_err(|e| match e {
            crossbeam_channel::SendTimeoutError::Timeout(_) => CommandError::from(InfraError::Timeout),
            crossbeam_channel::SendTimeoutError::Disconnected(_) => {
                CommandError::from(InfraError::ChannelClosed)
            }
        })
    }
}

/// Owns one instrument's matching state and runs its command loop on a
/// dedicated thread.
pub struct EngineWorker {
    instrument_id: InstrumentId,
    book: OrderBook,
    orders: HashMap<OrderId, Order>,
    trigger_pool: TriggerPool,
    scale: DecimalScale,
    reference_price: Option<Decimal>,
    state: WorkerState,
    matcher: Matcher,
    event_bus: EventBus,
}

impl EngineWorker {
    /// Spawns a worker thread for `config` and returns a handle to it plus
    /// the event bus subscribers can attach to.
    pub fn spawn(config: InstrumentConfig) -> (WorkerHandle, EventBus) {
        let event_bus = EventBus::with_capacity(config.instrument_id, config.event_buffer_capacity);
        let (tx, rx) = bounded(config.command_queue_capacity);
        let mut worker = EngineWorker {
            instrument_id: config.instrument_id,
            book: OrderBook::new(config.instrument_id),
            orders: HashMap::new(),
            trigger_pool: TriggerPool::new(),
            scale: config.scale,
            reference_price: None,
            state: WorkerState::Running,
            matcher: Matcher::new(),
            event_bus: event_bus.clone(),
        };
        let instrument_id = config.instrument_id;
        let _join: JoinHandle<()> = std::thread::Builder::new()
            .name(format!("engine-worker-{instrument_id}"))
            .spawn(move || {
                while let Ok(msg) = rx.recv() {
                    if worker.handle(msg) {
                        break;
                    }
                }
            })
            .expect("failed to spawn engine worker thread");

        (
            WorkerHandle {
                instrument_id,
                sender: tx,
            },
            event_bus,
        )
    }

    /// Processes one message. Returns `true` if the worker should stop.
    fn handle(&mut self, msg: WorkerMessage) -> bool {
        match msg {
            WorkerMessage::Submit(req, reply) => {
                let _ = reply.send(self.handle_submit(req));
            }
            WorkerMessage::Cancel(order_id, reply) => {
                let _ = reply.send(self.handle_cancel(order_id));
            }
            WorkerMessage::Halt(reply) => {
                if self.state == WorkerState::Running {
                    self.state = WorkerState::Halted;
                    log::info!("instrument {} halted", self.instrument_id);
                    self.event_bus.publish(EventKind::BookHalted);
                }
                let _ = reply.send(());
            }
            WorkerMessage::Resume(reply) => {
                if self.state == WorkerState::Halted {
                    self.state = WorkerState::Running;
                    log::info!("instrument {} resumed", self.instrument_id);
                    self.event_bus.publish(EventKind::BookResumed);
                }
                let _ = reply.send(());
            }
            WorkerMessage::Status(reply) => {
                let _ = reply.send(WorkerStatus {
                    instrument_id: self.instrument_id,
                    state: self.state,
                    resting_order_count: self.book.resting_order_count(),
                    best_bid: self.book.best_bid(),
                    best_ask: self.book.best_ask(),
                    reference_price: self.reference_price,
                    pending_triggers: self.trigger_pool.len(),
                });
            }
            WorkerMessage::Snapshot(reply) => {
                let _ = reply.send(WorkerSnapshot {
                    instrument_id: self.instrument_id,
                    state: self.state,
                    reference_price: self.reference_price,
                    resting_orders: self.book.resting_orders_snapshot(),
                });
            }
            WorkerMessage::Depth(n, reply) => {
                let _ = reply.send(depth::build_depth(&self.book, n));
            }
            WorkerMessage::Stop => return true,
        }
        false
    }

    fn handle_submit(&mut self, req: PlaceOrderRequest) -> Result<Order, CommandError> {
        match self.state {
            WorkerState::Halted => {
                return Err(CommandError::from(DomainError::OrderbookHalted(
                    self.instrument_id,
                )))
            }
            WorkerState::Faulted => {
                return Err(CommandError::from(DomainError::InstrumentFaulted(
                    self.instrument_id,
                )))
            }
            WorkerState::Running => {}
        }

        log::debug!("instrument {} processing submit {}", self.instrument_id, req.order_id);
        let now = now_millis();
        let order_id = req.order_id;
        let reference = self.reference_price.unwrap_or(
            req.limit_price
                .unwrap_or_else(|| self.book.best_bid().or_else(|| self.book.best_ask()).unwrap_or(Decimal::ZERO)),
        );
        let outcome = {
            let mut ctx = MatchContext {
                book: &mut self.book,
                orders: &mut self.orders,
                trigger_pool: &mut self.trigger_pool,
                scale: &self.scale,
                reference_price: reference,
                now,
            };
            self.matcher.process(Command::PlaceOrder(req), &mut ctx)
        };

        if let Some(reason) = outcome.rejected {
            log::warn!("instrument {} rejected order {}: {}", self.instrument_id, order_id, reason);
            self.event_bus.publish(EventKind::OrderRejected {
                order_id,
                reason: reason.to_string(),
            });
            return Err(CommandError::from(reason));
        }

        let accepted = outcome
            .accepted
            .clone()
            .expect("non-rejected outcome always carries the accepted order");
        self.publish_outcome(&outcome, now);
        self.drain_triggers(now);
        self.check_invariants();
        Ok(accepted)
    }

    fn handle_cancel(&mut self, order_id: OrderId) -> Result<Order, CommandError> {
        match self.state {
            WorkerState::Faulted => {
                return Err(CommandError::from(DomainError::InstrumentFaulted(
                    self.instrument_id,
                )))
            }
            WorkerState::Halted | WorkerState::Running => {}
        }

        log::debug!("instrument {} processing cancel {}", self.instrument_id, order_id);
        let now = now_millis();
        let reference = self.reference_price.unwrap_or(Decimal::ZERO);
        let outcome = {
            let mut ctx = MatchContext {
                book: &mut self.book,
                orders: &mut self.orders,
                trigger_pool: &mut self.trigger_pool,
                scale: &self.scale,
                reference_price: reference,
                now,
            };
            self.matcher.process(Command::CancelOrder(order_id), &mut ctx)
        };

        match outcome.cancelled.clone() {
            Some(order) => {
                self.event_bus.publish(EventKind::OrderCancelled {
                    order: order.clone(),
                });
                self.event_bus.publish(EventKind::OrderStatusChanged {
                    order_id: order.id,
                    status: order.status,
                });
                self.event_bus.publish(EventKind::DepthUpdated);
                self.check_invariants();
                Ok(order)
            }
            None => {
                log::warn!("instrument {} cancel rejected: order {} not found", self.instrument_id, order_id);
                Err(CommandError::from(DomainError::OrderNotFound(order_id)))
            }
        }
    }

    /// Publishes the events implied by one matcher outcome and advances the
    /// reference price from the last trade.
    fn publish_outcome(&mut self, outcome: &ProcessOutcome, _now: u64) {
        if let Some(order) = &outcome.accepted {
            self.event_bus.publish(EventKind::OrderAccepted {
                order: order.clone(),
            });
            if matches!(order.status, OrderStatus::New | OrderStatus::PartiallyFilled)
                && order.is_limit_like()
            {
                self.event_bus.publish(EventKind::OrderAdded {
                    order: order.clone(),
                });
            }
            self.event_bus.publish(EventKind::OrderStatusChanged {
                order_id: order.id,
                status: order.status,
            });
        }
        for trade in &outcome.trades {
            self.event_bus.publish(EventKind::TradeExecuted {
                trade: trade.clone(),
            });
            self.event_bus.publish(EventKind::OrderMatched {
                trade: trade.clone(),
            });
            self.reference_price = Some(trade.price);
        }
        for maker in &outcome.maker_updates {
            self.event_bus.publish(EventKind::OrderStatusChanged {
                order_id: maker.id,
                status: maker.status,
            });
        }
        let book_mutated = !outcome.trades.is_empty()
            || outcome.accepted.as_ref().is_some_and(|order| {
                matches!(order.status, OrderStatus::New | OrderStatus::PartiallyFilled) && order.is_limit_like()
            });
        if book_mutated {
            self.event_bus.publish(EventKind::DepthUpdated);
        }
    }

    /// Drains and processes any stop orders newly eligible at the current
    /// reference price, inline within the triggering command's step. Each
    /// triggered order can itself move the reference price and make further
    /// stops eligible, so this loops until the pool stops yielding anything.
    fn drain_triggers(&mut self, now: u64) {
        loop {
            let reference = match self.reference_price {
                Some(p) => p,
                None => break,
            };
            let triggered = self.trigger_pool.drain_eligible(reference);
            if triggered.is_empty() {
                break;
            }
            for order in triggered {
                self.event_bus.publish(EventKind::TriggerFired {
                    order_id: order.id,
                    trigger_price: order.trigger_price.unwrap_or(reference),
                });
                let outcome = {
                    let mut ctx = MatchContext {
                        book: &mut self.book,
                        orders: &mut self.orders,
                        trigger_pool: &mut self.trigger_pool,
                        scale: &self.scale,
                        reference_price: reference,
                        now,
                    };
                    self.matcher.run(order, &mut ctx)
                };
                self.publish_outcome(&outcome, now);
            }
        }
    }

    fn check_invariants(&mut self) {
        if let Err(e) = self.book.check_invariants() {
            log::error!(
                "instrument {} faulted on invariant violation: {}",
                self.instrument_id,
                e
            );
            self.state = WorkerState::Faulted;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AccountId;
    use crate::order::{OrderType, Side, TimeInForce};
    use rust_decimal_macros::dec;

    fn place(instrument_id: InstrumentId, side: Side, price: Decimal, amount: Decimal) -> PlaceOrderRequest {
        PlaceOrderRequest {
            order_id: OrderId::new(),
            client_order_id: None,
            account_id: AccountId::new(),
            instrument_id,
            side,
            order_type: OrderType::Limit,
            limit_price: Some(price),
            trigger_price: None,
            base_amount: amount,
            time_in_force: TimeInForce::GTC,
        }
    }

    #[test]
    fn submit_and_status_round_trip() {
        let instrument_id = InstrumentId::new();
        let config = InstrumentConfig::new(instrument_id, "X-Y", DecimalScale::default());
        let (handle, _bus) = EngineWorker::spawn(config);
        let order = handle
            .submit(place(instrument_id, Side::Bid, dec!(100), dec!(5)))
            .unwrap();
        assert_eq!(order.status, OrderStatus::New);
        let status = handle.status().unwrap();
        assert_eq!(status.resting_order_count, 1);
        assert_eq!(status.best_bid, Some(dec!(100)));
        handle.stop();
    }

    #[test]
    fn halt_rejects_new_submissions_until_resumed() {
        let instrument_id = InstrumentId::new();
        let config = InstrumentConfig::new(instrument_id, "X-Y", DecimalScale::default());
        let (handle, _bus) = EngineWorker::spawn(config);
        handle.halt().unwrap();
        let err = handle
            .submit(place(instrument_id, Side::Bid, dec!(100), dec!(5)))
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Domain(DomainError::OrderbookHalted(_))
        ));
        handle.resume().unwrap();
        let ok = handle.submit(place(instrument_id, Side::Bid, dec!(100), dec!(5)));
        assert!(ok.is_ok());
        handle.stop();
    }

    #[test]
    fn cancel_of_unknown_order_returns_not_found() {
        let instrument_id = InstrumentId::new();
        let config = InstrumentConfig::new(instrument_id, "X-Y", DecimalScale::default());
        let (handle, _bus) = EngineWorker::spawn(config);
        let err = handle.cancel(OrderId::new()).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Domain(DomainError::OrderNotFound(_))
        ));
        handle.stop();
    }

    #[test]
    fn matched_trade_emits_trade_executed_event() {
        let instrument_id = InstrumentId::new();
        let config = InstrumentConfig::new(instrument_id, "X-Y", DecimalScale::default());
        let (handle, bus) = EngineWorker::spawn(config);
        let rx = bus.subscribe();
        handle
            .submit(place(instrument_id, Side::Ask, dec!(100), dec!(5)))
            .unwrap();
        handle
            .submit(place(instrument_id, Side::Bid, dec!(100), dec!(5)))
            .unwrap();
        let mut saw_trade = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev.kind, EventKind::TradeExecuted { .. }) {
                saw_trade = true;
            }
        }
        assert!(saw_trade);
        handle.stop();
    }

    #[test]
    fn depth_reflects_resting_orders() {
        let instrument_id = InstrumentId::new();
        let config = InstrumentConfig::new(instrument_id, "X-Y", DecimalScale::default());
        let (handle, _bus) = EngineWorker::spawn(config);
        handle
            .submit(place(instrument_id, Side::Bid, dec!(99), dec!(3)))
            .unwrap();
        handle
            .submit(place(instrument_id, Side::Bid, dec!(100), dec!(2)))
            .unwrap();
        let depth = handle.depth(1).unwrap();
        assert_eq!(depth.bids.len(), 1);
        assert_eq!(depth.bids[0].price, dec!(100));
        handle.stop();
    }

    #[test]
    fn resting_order_and_cancel_both_emit_depth_updated() {
        let instrument_id = InstrumentId::new();
        let config = InstrumentConfig::new(instrument_id, "X-Y", DecimalScale::default());
        let (handle, bus) = EngineWorker::spawn(config);
        let rx = bus.subscribe();
        let order = handle
            .submit(place(instrument_id, Side::Bid, dec!(99), dec!(3)))
            .unwrap();
        let mut depth_updates = 0;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev.kind, EventKind::DepthUpdated) {
                depth_updates += 1;
            }
        }
        assert_eq!(depth_updates, 1);

        handle.cancel(order.id).unwrap();
        let mut saw_cancel_depth_update = false;
        while let Ok(ev) = rx.try_recv() {
            if matches!(ev.kind, EventKind::DepthUpdated) {
                saw_cancel_depth_update = true;
            }
        }
        assert!(saw_cancel_depth_update);
        handle.stop();
    }

    #[test]
    fn event_sequence_numbers_are_contiguous_per_instrument() {
        let instrument_id = InstrumentId::new();
        let config = InstrumentConfig::new(instrument_id, "X-Y", DecimalScale::default());
        let (handle, bus) = EngineWorker::spawn(config);
        let rx = bus.subscribe();
        handle
            .submit(place(instrument_id, Side::Bid, dec!(99), dec!(3)))
            .unwrap();
        handle
            .submit(place(instrument_id, Side::Ask, dec!(99), dec!(3)))
            .unwrap();
        let sequences: Vec<u64> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.sequence)
            .collect();
        assert!(sequences.len() >= 2);
        for pair in sequences.windows(2) {
            assert_eq!(pair[1], pair[0] + 1);
        }
        assert!(sequences.iter().all(|&s| s >= 1));
        handle.stop();
    }

    #[test]
    fn submit_with_timeout_fails_with_timeout_on_a_full_queue() {
        let instrument_id = InstrumentId::new();
        let (tx, _rx) = bounded(1);
        tx.send(WorkerMessage::Stop).unwrap();
        let handle = WorkerHandle {
            instrument_id,
            sender: tx,
        };
        let err = handle
            .submit_with_timeout(place(instrument_id, Side::Bid, dec!(100), dec!(1)), Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Infrastructure(InfraError::Timeout)
        ));
    }
}
