//! # Limit Matching Engine
//!
//! Deterministic, price-time-priority limit order book matching engine with
//! a multi-instrument orchestrator.
//!
//! ## Entry point
//!
//! Use [`Manager`] as the single entry point: [`Manager::register_instrument`]
//! spawns a dedicated worker thread for an instrument, then
//! [`Manager::submit`] and [`Manager::cancel`] route commands to it.
//! Subscribe to [`manager::Manager::subscribe`] for a live feed of
//! [`event::Event`]s for that instrument.
//!
//! ## Example
//!
//! ```rust
//! use limit_matching_engine::{Manager, InstrumentConfig, DecimalScale, InstrumentId, PlaceOrderRequest};
//! use limit_matching_engine::{AccountId, OrderId, Side, OrderType, TimeInForce};
//! use rust_decimal_macros::dec;
//!
//! let manager = Manager::new();
//! let instrument_id = InstrumentId::new();
//! manager
//!     .register_instrument(InstrumentConfig::new(instrument_id, "BTC-USD", DecimalScale::new(2, 8)))
//!     .unwrap();
//!
//! let order = manager
//!     .submit(
//!         instrument_id,
//!         PlaceOrderRequest {
//!             order_id: OrderId::new(),
//!             client_order_id: None,
//!             account_id: AccountId::new(),
//!             instrument_id,
//!             side: Side::Bid,
//!             order_type: OrderType::Limit,
//!             limit_price: Some(dec!(100)),
//!             trigger_price: None,
//!             base_amount: dec!(1),
//!             time_in_force: TimeInForce::GTC,
//!         },
//!     )
//!     .unwrap();
//! assert!(matches!(order.status, limit_matching_engine::OrderStatus::New));
//! manager.stop_all();
//! ```
//!
//! ## Lower-level API
//!
//! [`book::OrderBook`] and [`matcher::Matcher`] can be driven directly for
//! single-threaded embedding or tests that don't need the worker/manager
//! orchestration layer.

pub mod audit;
pub mod book;
pub mod config;
pub mod decimal;
pub mod depth;
pub mod error;
pub mod event;
pub mod ids;
pub mod manager;
pub mod market_data_gen;
pub mod matcher;
pub mod order;
pub mod persistence;
pub mod price_level;
pub mod trade;
pub mod trigger;
pub mod worker;

pub use book::OrderBook;
pub use config::InstrumentConfig;
pub use decimal::DecimalScale;
pub use depth::{DepthLevel, DepthSnapshot};
pub use error::{BookError, CommandError, DomainError, FatalError, InfraError, ValidationError};
pub use event::{Event, EventBus, EventKind};
pub use ids::{AccountId, InstrumentId, OrderId, TradeId};
pub use manager::Manager;
pub use matcher::{Command, MatchContext, Matcher, PlaceOrderRequest, ProcessOutcome};
pub use order::{Order, OrderStatus, OrderType, Side, TimeInForce};
pub use trade::Trade;
pub use worker::{EngineWorker, WorkerHandle, WorkerSnapshot, WorkerStatus};
