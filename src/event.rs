//! Non-blocking event fan-out.
//!
//! Every state change the matcher produces is turned into an [`Event`] and
//! broadcast to all current subscribers. Each subscriber gets its own
//! bounded buffer; a slow subscriber drops its oldest unread event rather
//! than ever blocking the worker thread, and receives a single
//! [`EventKind::SubscriberLagged`] marker so it knows it missed something.

use crate::ids::{InstrumentId, OrderId};
use crate::order::{Order, OrderStatus};
use crate::trade::Trade;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default per-subscriber buffer depth. Chosen generously enough that a
/// momentarily slow subscriber doesn't lag under ordinary bursts; sized
/// independently of the worker's command queue.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 4096;

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The kind-specific payload of a fact the matching engine has observed.
/// Carried inside an [`Event`] envelope, which adds the sequence number,
/// instrument id, and timestamp common to every kind.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum EventKind {
    OrderAccepted { order: Order },
    OrderRejected { order_id: OrderId, reason: String },
    OrderAdded { order: Order },
    OrderMatched { trade: Trade },
    TradeExecuted { trade: Trade },
    OrderCancelled { order: Order },
    OrderStatusChanged { order_id: OrderId, status: OrderStatus },
    DepthUpdated,
    TriggerFired { order_id: OrderId, trigger_price: Decimal },
    BookHalted,
    BookResumed,
    /// Sent to a subscriber in place of whatever it missed when its buffer
    /// overflowed. Carries no trade/order id: it is a gap marker, not a fact.
    SubscriberLagged { dropped: u64 },
}

/// An event envelope: every fact the engine publishes carries the
/// instrument it happened on, a monotonic per-instrument sequence number,
/// a timestamp, and the kind-specific payload.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub instrument_id: InstrumentId,
    pub timestamp: u64,
    pub kind: EventKind,
}

struct Subscriber {
    sender: Sender<Event>,
    dropped: u64,
}

/// Broadcast fan-out for one instrument's events. Cheap to clone: internally
/// an `Arc<Mutex<_>>` over the subscriber list and an `Arc<AtomicU64>` over
/// the sequence counter.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    capacity: usize,
    instrument_id: InstrumentId,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(instrument_id: InstrumentId) -> Self {
        Self::with_capacity(instrument_id, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_capacity(instrument_id: InstrumentId, capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            capacity,
            instrument_id,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = crossbeam_channel::bounded(self.capacity);
        self.subscribers.lock().push(Subscriber {
            sender: tx,
            dropped: 0,
        });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Wraps `kind` in an envelope carrying the next sequence number for
    /// this instrument and the current timestamp, then publishes it to
    /// every subscriber. Never blocks: a full buffer drops its oldest entry
    /// to make room, then delivers the new event, and the subscriber is
    /// marked lagged so its next read carries the marker.
    pub fn publish(&self, kind: EventKind) {
        let event = Event {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            instrument_id: self.instrument_id,
            timestamp: now_millis(),
            kind,
        };
        let mut subs = self.subscribers.lock();
        subs.retain_mut(|sub| match sub.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                // Drop the oldest queued event to make room, then retry once.
                let _ = sub.sender.try_recv();
                sub.dropped += 1;
                match sub.sender.try_send(ev) {
                    Ok(()) => {
                        log::warn!(
                            "instrument {} subscriber lagged, {} event(s) dropped",
                            self.instrument_id,
                            sub.dropped
                        );
                        let _ = sub.sender.try_send(Event {
                            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
                            instrument_id: self.instrument_id,
                            timestamp: now_millis(),
                            kind: EventKind::SubscriberLagged {
                                dropped: sub.dropped,
                            },
                        });
                        sub.dropped = 0;
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                    Err(TrySendError::Full(_)) => true,
                }
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
