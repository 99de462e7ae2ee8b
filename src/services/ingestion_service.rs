//! Trace ingestion: the synchronous operations a client drives.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BlobId, BlobRef, EventsAccepted, QaStage, Trace, TraceCreated, TraceFinalized, TraceStatus,
    DEFAULT_CONTENT_TYPE,
};
use crate::domain::ports::{JobQueue, TraceRepository};
use crate::domain::validation::{
    validate_event_batch, validate_finalize, validate_seq_monotonic, validate_trace_create,
};
use crate::services::ArtifactService;

/// Request/response operations over traces and blobs.
///
/// Request bodies arrive as raw JSON and are validated here; every write
/// is a single transaction in the repository.
#[derive(Clone)]
pub struct IngestionService {
    traces: Arc<dyn TraceRepository>,
    queue: Arc<dyn JobQueue>,
    artifacts: ArtifactService,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl IngestionService {
    pub fn new(traces: Arc<dyn TraceRepository>, queue: Arc<dyn JobQueue>, artifacts: ArtifactService) -> Self {
        Self {
            traces,
            queue,
            artifacts,
        }
    }

    #[instrument(skip(self, body), err)]
    pub async fn create_trace(&self, body: &Value) -> DomainResult<TraceCreated> {
        let request = validate_trace_create(body)?;
        let trace = Trace::new(request, now_ms());
        self.traces.create(&trace).await?;

        info!(trace_id = %trace.trace_id, "Trace created");
        Ok(TraceCreated {
            trace_id: trace.trace_id,
            created_at_ms: trace.created_at_ms,
            status: trace.status,
        })
    }

    async fn require_collecting(&self, trace_id: Uuid) -> DomainResult<Trace> {
        let trace = self
            .traces
            .get(trace_id)
            .await?
            .ok_or(DomainError::TraceNotFound(trace_id))?;

        if trace.status != TraceStatus::Collecting {
            return Err(DomainError::UnexpectedStatus {
                trace_id,
                actual: trace.status,
                expected: TraceStatus::Collecting,
            });
        }
        Ok(trace)
    }

    /// Append a batch of 1 to 100 events.
    ///
    /// Checks run in order: batch shape, trace lookup, trace state, seq
    /// monotonicity, duplicate ids. Nothing is persisted unless all pass.
    #[instrument(skip(self, body), fields(trace_id = %trace_id), err)]
    pub async fn append_events(&self, trace_id: Uuid, body: &Value) -> DomainResult<EventsAccepted> {
        let events = validate_event_batch(body)?;
        let trace = self.require_collecting(trace_id).await?;
        validate_seq_monotonic(&events, trace.seq_high)?;

        let mut seen = HashSet::new();
        let mut duplicates: Vec<String> = events
            .iter()
            .filter(|e| !seen.insert(e.event_id.as_str()))
            .map(|e| e.event_id.clone())
            .collect();
        let ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();
        for existing in self.traces.existing_event_ids(trace_id, &ids).await? {
            if !duplicates.contains(&existing) {
                duplicates.push(existing);
            }
        }
        if !duplicates.is_empty() {
            return Err(DomainError::DuplicateEventIds(duplicates));
        }

        let seq_high = self.traces.append_events(trace_id, trace.seq_high, &events).await?;

        info!(accepted = events.len(), seq_high, "Events appended");
        Ok(EventsAccepted {
            accepted: events.len(),
            seq_high,
        })
    }

    /// Close the trace to new events and enqueue the first QA stage.
    #[instrument(skip(self, body), fields(trace_id = %trace_id), err)]
    pub async fn finalize(&self, trace_id: Uuid, body: &Value) -> DomainResult<TraceFinalized> {
        let request = validate_finalize(body)?;
        self.require_collecting(trace_id).await?;
        self.traces.begin_finalize(trace_id, &request.final_state, now_ms()).await?;

        let qa_job_id = match self.queue.enqueue(QaStage::RunTests, trace_id).await {
            Ok(job_id) => job_id,
            Err(e) => {
                error!(error = %e, "Failed to enqueue QA pipeline");
                self.traces
                    .mark_failed(trace_id, &format!("Failed to enqueue QA pipeline: {e}"))
                    .await?;
                return Err(e);
            }
        };

        info!(job_id = %qa_job_id, "Trace finalized, QA queued");
        Ok(TraceFinalized {
            trace_id,
            status: TraceStatus::Finalizing,
            qa_job_id,
        })
    }

    /// Full trace document, optionally with its events and QA block.
    #[instrument(skip(self), err)]
    pub async fn get_trace(&self, trace_id: Uuid, include_events: bool, include_qa: bool) -> DomainResult<Trace> {
        let mut trace = self
            .traces
            .get(trace_id)
            .await?
            .ok_or(DomainError::TraceNotFound(trace_id))?;

        if include_events {
            trace.events = self.traces.list_events(trace_id).await?;
        }
        if !include_qa {
            trace.qa = None;
        }
        Ok(trace)
    }

    /// Store an uploaded artifact; the content type defaults to `application/octet-stream`.
    #[instrument(skip(self, data), fields(bytes = data.len()), err)]
    pub async fn upload_blob(&self, data: &[u8], content_type: Option<&str>) -> DomainResult<BlobRef> {
        let content_type = content_type
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let blob = self.artifacts.store(data, content_type).await?;

        info!(blob_id = %blob.blob_id, "Blob stored");
        Ok(blob)
    }

    pub async fn get_blob(&self, blob_id: &str) -> DomainResult<Vec<u8>> {
        self.artifacts.fetch(blob_id).await
    }

    pub async fn blob_metadata(&self, blob_id: &str) -> DomainResult<BlobRef> {
        let id = BlobId::parse(blob_id).map_err(|_| DomainError::InvalidBlobId(blob_id.to_string()))?;
        self.artifacts
            .metadata(&id)
            .await?
            .ok_or_else(|| DomainError::BlobNotFound(blob_id.to_string()))
    }
}
