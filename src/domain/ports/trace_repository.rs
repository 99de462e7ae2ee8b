//! Trace repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Event, FinalState, JudgeResult, QaTests, Trace};

/// Repository interface for trace and event persistence.
///
/// Every mutation is a single short transaction. State changes are
/// compare-and-swap updates on the trace's status; QA writes only land
/// while the trace is `finalizing`.
#[async_trait]
pub trait TraceRepository: Send + Sync {
    /// Insert a new trace.
    async fn create(&self, trace: &Trace) -> DomainResult<()>;

    /// Get a trace by ID, without its events.
    async fn get(&self, trace_id: Uuid) -> DomainResult<Option<Trace>>;

    /// Events of a trace in seq order.
    async fn list_events(&self, trace_id: Uuid) -> DomainResult<Vec<Event>>;

    /// Which of `event_ids` are already persisted for the trace.
    async fn existing_event_ids(&self, trace_id: Uuid, event_ids: &[String]) -> DomainResult<Vec<String>>;

    /// Persist a batch and advance the high-water seq.
    ///
    /// Fails with `ConcurrencyConflict` when the stored high-water seq no
    /// longer equals `expected_seq_high` or the trace left `collecting`, and
    /// with `DuplicateEventIds` when an id collides with a stored event.
    /// Returns the new high-water seq.
    async fn append_events(&self, trace_id: Uuid, expected_seq_high: u64, events: &[Event]) -> DomainResult<u64>;

    /// Move `collecting` to `finalizing`, recording the final state.
    async fn begin_finalize(&self, trace_id: Uuid, final_state: &FinalState, finalized_at_ms: i64) -> DomainResult<()>;

    /// Attach sandbox test results to the trace's QA block.
    async fn record_tests(&self, trace_id: Uuid, tests: &QaTests) -> DomainResult<()>;

    /// Attach the evaluator result to the trace's QA block.
    async fn record_judge(&self, trace_id: Uuid, judge: &JudgeResult) -> DomainResult<()>;

    /// Move `finalizing` to `complete`.
    async fn mark_complete(&self, trace_id: Uuid) -> DomainResult<()>;

    /// Move `finalizing` to `failed`, recording `error` in the QA block and
    /// clearing `schema_valid`.
    ///
    /// Returns `false` when the trace was not `finalizing`.
    async fn mark_failed(&self, trace_id: Uuid, error: &str) -> DomainResult<bool>;
}
