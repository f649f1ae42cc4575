//! Typed error taxonomy: validation / admission / not-found / infrastructure /
//! fatal, one small enum per surface instead of stringly typed errors.

use crate::ids::{InstrumentId, OrderId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from [`crate::book::OrderBook`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("order {0} is already resting in the book")]
    DuplicateOrderId(OrderId),
    #[error("order {0} was not found in the book")]
    OrderNotFound(OrderId),
}

/// Invariant violations that can only mean a bug in the book or its index.
/// Surfaced once and then the owning worker refuses further commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("order index has no entry for resting order {0}")]
    MissingIndexEntry(OrderId),
    #[error("book crossed: best_bid {best_bid} >= best_ask {best_ask}")]
    CrossedBook { best_bid: Decimal, best_ask: Decimal },
    #[error("price level cache desynchronized: {0}")]
    CacheDesync(String),
}

/// Order validation failures. Surfaced to the caller as `Rejected` and
/// emitted as `OrderRejected`; the order is never placed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("base amount must be positive")]
    NonPositiveAmount,
    #[error("price must be non-negative")]
    NegativePrice,
    #[error("limit price is required for this order type")]
    MissingLimitPrice,
    #[error("trigger price is required for this order type")]
    MissingTriggerPrice,
    #[error("order instrument {order_instrument} does not match book instrument {book_instrument}")]
    InstrumentMismatch {
        order_instrument: InstrumentId,
        book_instrument: InstrumentId,
    },
    #[error("price or quantity exceeds the instrument's declared decimal scale")]
    ScaleExceeded,
}

/// Admission and not-found errors surfaced to the caller without an event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("instrument {0} is halted")]
    OrderbookHalted(InstrumentId),
    #[error("engine has been stopped")]
    EngineStopped,
    #[error("order {0} was not found")]
    OrderNotFound(OrderId),
    #[error("instrument {0} is not registered")]
    InstrumentNotRegistered(InstrumentId),
    #[error("instrument {0} has faulted and is unavailable")]
    InstrumentFaulted(InstrumentId),
    #[error("instrument {0} is already registered")]
    InstrumentAlreadyRegistered(InstrumentId),
}

/// Infrastructure errors: never emitted as events, always surfaced to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InfraError {
    #[error("command timed out before a reply was received")]
    Timeout,
    #[error("worker command channel is closed")]
    ChannelClosed,
    #[error("worker command channel is full")]
    ChannelFull,
}

/// The error type returned to external callers from the Manager's command
/// interface: every command either succeeds, fails with a domain error, or
/// times out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("rejected: {reason}")]
    Rejected { reason: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infrastructure(#[from] InfraError),
}

impl From<ValidationError> for CommandError {
    fn from(e: ValidationError) -> Self {
        CommandError::Rejected {
            reason: e.to_string(),
        }
    }
}
