//! Event emission.
//!
//! The engine emits one event per committed transition. Sinks fan the
//! stream out to calendar, reporting, and notification consumers; the
//! provided implementations cover tests (in-memory) and structured logs
//! (tracing).

use parking_lot::Mutex;

use caseflow_core::GrievanceEvent;

/// Consumer of the transition event stream.
///
/// Emission happens after the owning repository write commits; a sink must
/// not assume it can veto or roll back the transition.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GrievanceEvent);
}

/// Collects events in memory. Used by tests and small embedded deployments.
#[derive(Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<GrievanceEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events emitted so far, in emission order.
    pub fn events(&self) -> Vec<GrievanceEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: GrievanceEvent) {
        self.events.lock().push(event);
    }
}

/// Emits each event as a structured tracing record.
#[derive(Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn emit(&self, event: GrievanceEvent) {
        tracing::info!(
            grievance_id = %event.grievance_id,
            event = event.kind.name(),
            occurred_at = %event.occurred_at,
            "grievance transition"
        );
    }
}
