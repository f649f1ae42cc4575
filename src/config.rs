//! Instrument configuration.
//!
//! An `InstrumentConfig` is what the manager needs to register a new
//! instrument: its id, declared decimal scale, bounded command queue depth,
//! and event buffer depth. It is plain data — `serde`-serializable so it can
//! be loaded from whatever format an embedder chooses — with no file or
//! environment-variable format of its own.

use crate::event::DEFAULT_SUBSCRIBER_CAPACITY;
use crate::ids::InstrumentId;
use crate::decimal::DecimalScale;

/// Default depth of a worker's bounded command queue.
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 8192;

/// Static configuration for one instrument's order book and worker.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct InstrumentConfig {
    pub instrument_id: InstrumentId,
    pub symbol: String,
    pub scale: DecimalScale,
    pub command_queue_capacity: usize,
    pub event_buffer_capacity: usize,
}

impl InstrumentConfig {
    pub fn new(instrument_id: InstrumentId, symbol: impl Into<String>, scale: DecimalScale) -> Self {
        Self {
            instrument_id,
            symbol: symbol.into(),
            scale,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            event_buffer_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }

    pub fn with_command_queue_capacity(mut self, capacity: usize) -> Self {
        self.command_queue_capacity = capacity;
        self
    }

    pub fn with_event_buffer_capacity(mut self, capacity: usize) -> Self {
        self.event_buffer_capacity = capacity;
        self
    }
}
