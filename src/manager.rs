//! Multi-instrument orchestrator.
//!
//! Routes every command to the worker owning its instrument. The instrument
//! table and the halted-instrument set are both read far more often than
//! written (registration/halt/resume are rare; submit/cancel/status are
//! constant), so they sit behind `parking_lot` `RwLock`s rather than a full
//! mutex.

use crate::audit::{AuditEvent, AuditSink, StdoutAuditSink};
use crate::config::InstrumentConfig;
use crate::depth::DepthSnapshot;
use crate::error::{CommandError, DomainError};
use crate::event::{Event, EventBus};
use crate::ids::{InstrumentId, OrderId};
use crate::matcher::PlaceOrderRequest;
use crate::order::Order;
use crate::worker::{EngineWorker, WorkerHandle, WorkerSnapshot, WorkerStatus};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Actor recorded against every audit record the Manager emits. There is no
/// caller-identity plumbing in scope (authentication is an external
/// collaborator's concern), so every administrative action is attributed to
/// this fixed actor.
const AUDIT_ACTOR: &str = "system";

struct WorkerEntry {
    handle: WorkerHandle,
    event_bus: EventBus,
}

/// Owns every instrument's worker and routes commands to the right one by
/// instrument id. Cheap to clone: internally an `Arc`-free `RwLock` wrapper
/// is not `Clone` itself, so share a `Manager` behind an `Arc` if multiple
/// threads need to submit concurrently — which is the expected usage, since
/// each worker already serializes its own instrument's commands.
pub struct Manager {
    workers: RwLock<HashMap<InstrumentId, WorkerEntry>>,
    /// Mirrors each worker's halted/running state so `submit` can reject a
    /// halted instrument with a local set lookup instead of a round trip
    /// through the worker's command channel.
    halted: RwLock<HashSet<InstrumentId>>,
    audit_sink: Box<dyn AuditSink>,
}

impl Manager {
    pub fn new() -> Self {
        Self::with_audit_sink(Box::new(StdoutAuditSink))
    }

    /// Builds a `Manager` that records administrative actions through a
    /// caller-supplied sink, e.g. an `InMemoryAuditSink` in tests.
    pub fn with_audit_sink(audit_sink: Box<dyn AuditSink>) -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
            halted: RwLock::new(HashSet::new()),
            audit_sink,
        }
    }

    /// Spawns a worker for `config.instrument_id`. Errors if that instrument
    /// is already registered.
    pub fn register_instrument(&self, config: InstrumentConfig) -> Result<(), DomainError> {
        let instrument_id = config.instrument_id;
        let mut workers = self.workers.write();
        if workers.contains_key(&instrument_id) {
            self.audit_sink.emit(&AuditEvent::now(
                AUDIT_ACTOR,
                "instrument_registration",
                Some(serde_json::json!({ "instrument_id": instrument_id })),
                "rejected",
            ));
            return Err(DomainError::InstrumentAlreadyRegistered(instrument_id));
        }
        let (handle, event_bus) = EngineWorker::spawn(config);
        workers.insert(instrument_id, WorkerEntry { handle, event_bus });
        log::info!("instrument {} registered", instrument_id);
        self.audit_sink.emit(&AuditEvent::now(
            AUDIT_ACTOR,
            "instrument_registration",
            Some(serde_json::json!({ "instrument_id": instrument_id })),
            "success",
        ));
        Ok(())
    }

    pub fn is_registered(&self, instrument_id: InstrumentId) -> bool {
        self.workers.read().contains_key(&instrument_id)
    }

    pub fn list_instruments(&self) -> Vec<InstrumentId> {
        self.workers.read().keys().copied().collect()
    }

    fn handle_for(&self, instrument_id: InstrumentId) -> Result<WorkerHandle, CommandError> {
        self.workers
            .read()
            .get(&instrument_id)
            .map(|e| e.handle.clone())
            .ok_or(CommandError::Domain(DomainError::InstrumentNotRegistered(
                instrument_id,
            )))
    }

    /// Fast admission check: an instrument the Manager has locally marked
    /// halted is rejected without ever reaching the worker's channel.
    fn check_not_halted(&self, instrument_id: InstrumentId) -> Result<(), CommandError> {
        if self.halted.read().contains(&instrument_id) {
            return Err(CommandError::Domain(DomainError::OrderbookHalted(instrument_id)));
        }
        Ok(())
    }

    pub fn submit(&self, instrument_id: InstrumentId, request: PlaceOrderRequest) -> Result<Order, CommandError> {
        self.check_not_halted(instrument_id)?;
        self.handle_for(instrument_id)?.submit(request)
    }

    /// Like [`Self::submit`], but bounds the enqueue step with `timeout`
    /// instead of failing immediately on a full worker queue.
    pub fn submit_with_timeout(
        &self,
        instrument_id: InstrumentId,
        request: PlaceOrderRequest,
        timeout: Duration,
    ) -> Result<Order, CommandError> {
        self.check_not_halted(instrument_id)?;
        self.handle_for(instrument_id)?.submit_with_timeout(request, timeout)
    }

    /// Cancellation remains admissible while an instrument is halted; only
    /// `submit` is gated by the halted set.
    pub fn cancel(&self, instrument_id: InstrumentId, order_id: OrderId) -> Result<Order, CommandError> {
        self.handle_for(instrument_id)?.cancel(order_id)
    }

    /// Like [`Self::cancel`], but bounds the enqueue step with `timeout`.
    pub fn cancel_with_timeout(
        &self,
        instrument_id: InstrumentId,
        order_id: OrderId,
        timeout: Duration,
    ) -> Result<Order, CommandError> {
        self.handle_for(instrument_id)?.cancel_with_timeout(order_id, timeout)
    }

    pub fn halt(&self, instrument_id: InstrumentId) -> Result<(), CommandError> {
        let result = self.handle_for(instrument_id)?.halt();
        let outcome = if result.is_ok() { "success" } else { "error" };
        if result.is_ok() {
            self.halted.write().insert(instrument_id);
        }
        self.audit_sink.emit(&AuditEvent::now(
            AUDIT_ACTOR,
            "market_state_change",
            Some(serde_json::json!({ "instrument_id": instrument_id, "state": "halted" })),
            outcome,
        ));
        result
    }

    pub fn resume(&self, instrument_id: InstrumentId) -> Result<(), CommandError> {
        let result = self.handle_for(instrument_id)?.resume();
        let outcome = if result.is_ok() { "success" } else { "error" };
        if result.is_ok() {
            self.halted.write().remove(&instrument_id);
        }
        self.audit_sink.emit(&AuditEvent::now(
            AUDIT_ACTOR,
            "market_state_change",
            Some(serde_json::json!({ "instrument_id": instrument_id, "state": "running" })),
            outcome,
        ));
        result
    }

    pub fn status(&self, instrument_id: InstrumentId) -> Result<WorkerStatus, CommandError> {
        self.handle_for(instrument_id)?.status()
    }

    pub fn snapshot(&self, instrument_id: InstrumentId) -> Result<WorkerSnapshot, CommandError> {
        self.handle_for(instrument_id)?.snapshot()
    }

    /// Aggregated top-`n` depth view for `instrument_id`.
    pub fn depth(&self, instrument_id: InstrumentId, n: usize) -> Result<DepthSnapshot, CommandError> {
        self.handle_for(instrument_id)?.depth(n)
    }

    pub fn subscribe(&self, instrument_id: InstrumentId) -> Result<Receiver<Event>, CommandError> {
        let workers = self.workers.read();
        let entry = workers
            .get(&instrument_id)
            .ok_or(CommandError::Domain(DomainError::InstrumentNotRegistered(
                instrument_id,
            )))?;
        Ok(entry.event_bus.subscribe())
    }

    /// Stops every worker's thread. Workers finish their in-flight command
    /// before exiting; queued-but-unprocessed commands are simply dropped.
    pub fn stop_all(&self) {
        let mut workers = self.workers.write();
        for entry in workers.values() {
            entry.handle.stop();
        }
        workers.clear();
        self.halted.write().clear();
        log::info!("manager stopped all instruments");
        self.audit_sink.emit(&AuditEvent::now(AUDIT_ACTOR, "stop", None, "success"));
    }

    /// Stops and deregisters a single instrument's worker.
    pub fn stop_instrument(&self, instrument_id: InstrumentId) -> Result<(), DomainError> {
        let mut workers = self.workers.write();
        match workers.remove(&instrument_id) {
            Some(entry) => {
                entry.handle.stop();
                self.halted.write().remove(&instrument_id);
                log::info!("instrument {} stopped", instrument_id);
                self.audit_sink.emit(&AuditEvent::now(
                    AUDIT_ACTOR,
                    "stop",
                    Some(serde_json::json!({ "instrument_id": instrument_id })),
                    "success",
                ));
                Ok(())
            }
            None => {
                self.audit_sink.emit(&AuditEvent::now(
                    AUDIT_ACTOR,
                    "stop",
                    Some(serde_json::json!({ "instrument_id": instrument_id })),
                    "rejected",
                ));
                Err(DomainError::InstrumentNotRegistered(instrument_id))
            }
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
