//! Diagnostic records and the injected sink collaborator.
//!
//! The engine never writes to a log file or console on its own. Every
//! observable event is packaged as a [`DiagnosticRecord`] and handed to an
//! injected [`DiagnosticSink`]. A sink that fails must never break a
//! dispatch: [`emit`] swallows sink panics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use uuid::Uuid;

/// Kind of event a diagnostic record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A compiled evaluator is about to compile its source text.
    CompileAttempt,
    /// An evaluator is about to run.
    EvaluateAttempt,
    /// A command matched no outgoing transition of the active state.
    NoTransitionFound,
    /// A target state's entry guard rejected the entity.
    EntryGuardRejected,
    /// A handler or transition action failed during evaluation.
    ActionEvaluationError,
}

/// A single diagnostic event emitted by the engine.
///
/// # Example
///
/// ```rust
/// use chartflow::diag::{DiagnosticKind, DiagnosticRecord};
///
/// let record = DiagnosticRecord::new(DiagnosticKind::NoTransitionFound, "idle")
///     .with_command("start");
/// assert_eq!(record.state, "idle");
/// assert_eq!(record.command.as_deref(), Some("start"));
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticRecord {
    pub kind: DiagnosticKind,
    pub timestamp: DateTime<Utc>,
    /// Identifier of the state the event relates to.
    pub state: String,
    /// Command being dispatched, when one is in flight.
    pub command: Option<String>,
    /// Identity of the entity, when it exposes one.
    pub entity: Option<String>,
    /// Free-form detail (source text, error message).
    pub detail: Option<String>,
    /// Id of the dispatcher that emitted the record.
    pub dispatcher: Option<Uuid>,
}

impl DiagnosticRecord {
    /// Create a record stamped with the current time.
    pub fn new(kind: DiagnosticKind, state: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            state: state.into(),
            command: None,
            entity: None,
            detail: None,
            dispatcher: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_dispatcher(mut self, id: Uuid) -> Self {
        self.dispatcher = Some(id);
        self
    }
}

/// Receiver for diagnostic records.
///
/// Implementations must be cheap and must not block; the engine calls
/// `accept` inline during dispatch.
pub trait DiagnosticSink: Send + Sync {
    fn accept(&self, record: DiagnosticRecord);
}

/// Hand a record to a sink, swallowing any panic the sink raises.
///
/// Dispatch must never fail because a sink misbehaved.
pub fn emit(sink: &dyn DiagnosticSink, record: DiagnosticRecord) {
    let _ = catch_unwind(AssertUnwindSafe(|| sink.accept(record)));
}

/// Sink that discards every record.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn accept(&self, _record: DiagnosticRecord) {}
}

/// Sink that buffers records in memory for later inspection.
///
/// Used by tests to observe engine behavior (compile-once, no-match
/// reporting) without a real logging backend.
///
/// # Example
///
/// ```rust
/// use chartflow::diag::{DiagnosticKind, DiagnosticRecord, DiagnosticSink, MemorySink};
///
/// let sink = MemorySink::new();
/// sink.accept(DiagnosticRecord::new(DiagnosticKind::EvaluateAttempt, "busy"));
/// assert_eq!(sink.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the buffered records.
    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Count of records with the given kind.
    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for MemorySink {
    fn accept(&self, record: DiagnosticRecord) {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(record);
    }
}

/// Sink that forwards records to the `tracing` ecosystem.
///
/// Failure kinds are logged at warn level, everything else at debug.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn accept(&self, record: DiagnosticRecord) {
        match record.kind {
            DiagnosticKind::ActionEvaluationError | DiagnosticKind::EntryGuardRejected => {
                tracing::warn!(
                    kind = ?record.kind,
                    state = %record.state,
                    command = record.command.as_deref().unwrap_or(""),
                    detail = record.detail.as_deref().unwrap_or(""),
                    "statechart diagnostic"
                );
            }
            _ => {
                tracing::debug!(
                    kind = ?record.kind,
                    state = %record.state,
                    command = record.command.as_deref().unwrap_or(""),
                    "statechart diagnostic"
                );
            }
        }
    }
}
