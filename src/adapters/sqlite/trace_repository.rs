//! SQLite implementation of the TraceRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::{is_unique_violation, parse_json, parse_optional_json, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Event, EventPayload, EventType, FinalState, JudgeResult, Qa, QaTests, Trace, TraceStatus,
};
use crate::domain::ports::TraceRepository;

const TRACE_COLUMNS: &str = "trace_id, trace_version, status, repo_json, task_json, developer_json, \
     environment_json, final_state_json, qa_json, seq_high, created_at_ms, finalized_at_ms";

#[derive(Clone)]
pub struct SqliteTraceRepository {
    pool: SqlitePool,
}

impl SqliteTraceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Status of a trace inside an open transaction, `TraceNotFound` if absent.
    async fn status_in_tx(tx: &mut Transaction<'_, Sqlite>, trace_id: Uuid) -> DomainResult<TraceStatus> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM traces WHERE trace_id = ?")
            .bind(trace_id.to_string())
            .fetch_optional(&mut **tx)
            .await?;
        let (status,) = row.ok_or(DomainError::TraceNotFound(trace_id))?;
        parse_status(&status)
    }

    /// Explain why a status compare-and-swap matched no row.
    async fn cas_failure(&self, trace_id: Uuid, expected: TraceStatus) -> DomainError {
        match self.get(trace_id).await {
            Ok(Some(trace)) => DomainError::UnexpectedStatus {
                trace_id,
                actual: trace.status,
                expected,
            },
            Ok(None) => DomainError::TraceNotFound(trace_id),
            Err(e) => e,
        }
    }

    /// Read-modify-write of the QA block while the trace is `finalizing`.
    async fn update_qa(&self, trace_id: Uuid, apply: impl FnOnce(&mut Qa) + Send) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT status, qa_json FROM traces WHERE trace_id = ?")
                .bind(trace_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let (status, qa_json) = row.ok_or(DomainError::TraceNotFound(trace_id))?;
        let status = parse_status(&status)?;
        if status != TraceStatus::Finalizing {
            return Err(DomainError::UnexpectedStatus {
                trace_id,
                actual: status,
                expected: TraceStatus::Finalizing,
            });
        }

        let mut qa: Qa = parse_optional_json(qa_json)?.unwrap_or_default();
        apply(&mut qa);

        sqlx::query(
            "UPDATE traces SET qa_json = ?, updated_at = ? WHERE trace_id = ? AND status = 'finalizing'",
        )
        .bind(serde_json::to_string(&qa)?)
        .bind(Utc::now().to_rfc3339())
        .bind(trace_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn parse_status(s: &str) -> DomainResult<TraceStatus> {
    TraceStatus::from_str(s)
        .ok_or_else(|| DomainError::SerializationError(format!("Invalid trace status: {s}")))
}

#[async_trait]
impl TraceRepository for SqliteTraceRepository {
    async fn create(&self, trace: &Trace) -> DomainResult<()> {
        let final_state_json = trace.final_state.as_ref().map(serde_json::to_string).transpose()?;
        let qa_json = trace.qa.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(&format!(
            "INSERT INTO traces ({TRACE_COLUMNS}, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(trace.trace_id.to_string())
        .bind(&trace.trace_version)
        .bind(trace.status.as_str())
        .bind(serde_json::to_string(&trace.repo)?)
        .bind(serde_json::to_string(&trace.task)?)
        .bind(serde_json::to_string(&trace.developer)?)
        .bind(serde_json::to_string(&trace.environment)?)
        .bind(final_state_json)
        .bind(qa_json)
        .bind(trace.seq_high as i64)
        .bind(trace.created_at_ms)
        .bind(trace.finalized_at_ms)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, trace_id: Uuid) -> DomainResult<Option<Trace>> {
        let row: Option<TraceRow> =
            sqlx::query_as(&format!("SELECT {TRACE_COLUMNS} FROM traces WHERE trace_id = ?"))
                .bind(trace_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Trace::try_from).transpose()
    }

    async fn list_events(&self, trace_id: Uuid) -> DomainResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT event_id, seq, ts_ms, event_type, actor_json, context_json, payload_json
             FROM trace_events WHERE trace_id = ? ORDER BY seq",
        )
        .bind(trace_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Event::try_from).collect()
    }

    async fn existing_event_ids(&self, trace_id: Uuid, event_ids: &[String]) -> DomainResult<Vec<String>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; event_ids.len()].join(", ");
        let sql = format!(
            "SELECT event_id FROM trace_events WHERE trace_id = ? AND event_id IN ({placeholders}) ORDER BY seq"
        );
        let mut query = sqlx::query_as::<_, (String,)>(&sql).bind(trace_id.to_string());
        for id in event_ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn append_events(&self, trace_id: Uuid, expected_seq_high: u64, events: &[Event]) -> DomainResult<u64> {
        let new_high = events.iter().map(|e| e.seq).max().unwrap_or(expected_seq_high);
        let mut tx = self.pool.begin().await?;

        // Taking the write lock first serializes concurrent appenders on this row.
        let result = sqlx::query(
            "UPDATE traces SET seq_high = ?, updated_at = ?
             WHERE trace_id = ? AND seq_high = ? AND status = 'collecting'",
        )
        .bind(new_high as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(trace_id.to_string())
        .bind(expected_seq_high as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ConcurrencyConflict {
                entity: "trace".to_string(),
                id: trace_id.to_string(),
            });
        }

        for event in events {
            let context_json = event.context.as_ref().map(serde_json::to_string).transpose()?;
            let inserted = sqlx::query(
                "INSERT INTO trace_events (trace_id, event_id, seq, ts_ms, event_type, actor_json, context_json, payload_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(trace_id.to_string())
            .bind(&event.event_id)
            .bind(event.seq as i64)
            .bind(event.ts_ms)
            .bind(event.event_type.as_str())
            .bind(serde_json::to_string(&event.actor)?)
            .bind(context_json)
            .bind(serde_json::to_string(&event.payload)?)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(DomainError::DuplicateEventIds(vec![event.event_id.clone()]));
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(new_high)
    }

    async fn begin_finalize(&self, trace_id: Uuid, final_state: &FinalState, finalized_at_ms: i64) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE traces SET status = 'finalizing', final_state_json = ?, finalized_at_ms = ?, updated_at = ?
             WHERE trace_id = ? AND status = 'collecting'",
        )
        .bind(serde_json::to_string(final_state)?)
        .bind(finalized_at_ms)
        .bind(Utc::now().to_rfc3339())
        .bind(trace_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.cas_failure(trace_id, TraceStatus::Collecting).await);
        }
        Ok(())
    }

    async fn record_tests(&self, trace_id: Uuid, tests: &QaTests) -> DomainResult<()> {
        let tests = tests.clone();
        self.update_qa(trace_id, move |qa| qa.tests = Some(tests)).await
    }

    async fn record_judge(&self, trace_id: Uuid, judge: &JudgeResult) -> DomainResult<()> {
        let judge = judge.clone();
        self.update_qa(trace_id, move |qa| qa.judge = Some(judge)).await
    }

    async fn mark_complete(&self, trace_id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let status = Self::status_in_tx(&mut tx, trace_id).await?;
        if !status.can_transition_to(TraceStatus::Complete) {
            return Err(DomainError::InvalidStateTransition {
                from: status,
                to: TraceStatus::Complete,
            });
        }

        sqlx::query("UPDATE traces SET status = 'complete', updated_at = ? WHERE trace_id = ? AND status = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(trace_id.to_string())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn mark_failed(&self, trace_id: Uuid, error: &str) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT status, qa_json FROM traces WHERE trace_id = ?")
                .bind(trace_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        let Some((status, qa_json)) = row else {
            return Ok(false);
        };
        if !parse_status(&status)?.can_transition_to(TraceStatus::Failed) {
            return Ok(false);
        }

        let mut qa: Qa = parse_optional_json(qa_json)?.unwrap_or_default();
        qa.schema_valid = false;
        qa.error = Some(error.to_string());

        let result = sqlx::query(
            "UPDATE traces SET status = 'failed', qa_json = ?, updated_at = ?
             WHERE trace_id = ? AND status = 'finalizing'",
        )
        .bind(serde_json::to_string(&qa)?)
        .bind(Utc::now().to_rfc3339())
        .bind(trace_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct TraceRow {
    trace_id: String,
    trace_version: String,
    status: String,
    repo_json: String,
    task_json: String,
    developer_json: String,
    environment_json: String,
    final_state_json: Option<String>,
    qa_json: Option<String>,
    seq_high: i64,
    created_at_ms: i64,
    finalized_at_ms: Option<i64>,
}

impl TryFrom<TraceRow> for Trace {
    type Error = DomainError;

    fn try_from(row: TraceRow) -> Result<Self, Self::Error> {
        Ok(Trace {
            trace_version: row.trace_version,
            trace_id: parse_uuid(&row.trace_id)?,
            created_at_ms: row.created_at_ms,
            finalized_at_ms: row.finalized_at_ms,
            status: parse_status(&row.status)?,
            repo: parse_json(&row.repo_json)?,
            task: parse_json(&row.task_json)?,
            developer: parse_json(&row.developer_json)?,
            environment: parse_json(&row.environment_json)?,
            seq_high: u64::try_from(row.seq_high).unwrap_or(0),
            events: Vec::new(),
            final_state: parse_optional_json(row.final_state_json)?,
            qa: parse_optional_json(row.qa_json)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    event_id: String,
    seq: i64,
    ts_ms: i64,
    event_type: String,
    actor_json: String,
    context_json: Option<String>,
    payload_json: String,
}

impl TryFrom<EventRow> for Event {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_type = EventType::from_str(&row.event_type).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid event type: {}", row.event_type))
        })?;
        let payload = EventPayload::from_value(event_type, parse_json(&row.payload_json)?)?;

        Ok(Event {
            event_id: row.event_id,
            seq: u64::try_from(row.seq).unwrap_or(0),
            ts_ms: row.ts_ms,
            event_type,
            actor: parse_json(&row.actor_json)?,
            context: parse_optional_json(row.context_json)?,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{TraceCreate, TestInvocation};
    use serde_json::json;

    async fn setup() -> SqliteTraceRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteTraceRepository::new(pool)
    }

    fn sample_trace() -> Trace {
        let create: TraceCreate = serde_json::from_value(json!({
            "repo": {"repo_id": "r1", "commit_base": "abc123"},
            "task": {"bug_report": {"title": "Crash", "description": "It crashes"}},
            "developer": {"developer_id": "dev-1"},
            "environment": {"ide": {"name": "vscode"}}
        }))
        .unwrap();
        Trace::new(create, 1_700_000_000_000)
    }

    fn thought(seq: u64, event_id: &str) -> Event {
        serde_json::from_value(json!({
            "event_id": event_id,
            "seq": seq,
            "ts_ms": 10 * seq,
            "type": "thought",
            "actor": {"kind": "human"},
            "payload": {"content_blob_id": "sha256:aa", "kind": "plan"}
        }))
        .unwrap()
    }

    fn sample_tests() -> QaTests {
        QaTests {
            runner: "pytest -q".to_string(),
            container_image: Some("python:3.12-slim".to_string()),
            invocations: vec![TestInvocation {
                invocation_id: "inv-1".to_string(),
                ts_ms: 1,
                command: "pytest -q".to_string(),
                exit_code: 0,
                duration_ms: 5,
                passed: true,
                report_blob_id: None,
                stdout_blob_id: None,
                stderr_blob_id: None,
            }],
            final_passed: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup().await;
        let trace = sample_trace();
        repo.create(&trace).await.unwrap();

        let loaded = repo.get(trace.trace_id).await.unwrap().unwrap();
        assert_eq!(loaded, trace);
        assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_advances_high_water_seq() {
        let repo = setup().await;
        let trace = sample_trace();
        repo.create(&trace).await.unwrap();

        let high = repo
            .append_events(trace.trace_id, 0, &[thought(1, "e1"), thought(3, "e3")])
            .await
            .unwrap();
        assert_eq!(high, 3);

        let events = repo.list_events(trace.trace_id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], thought(3, "e3"));
        assert_eq!(repo.get(trace.trace_id).await.unwrap().unwrap().seq_high, 3);
    }

    #[tokio::test]
    async fn test_stale_high_water_seq_conflicts() {
        let repo = setup().await;
        let trace = sample_trace();
        repo.create(&trace).await.unwrap();
        repo.append_events(trace.trace_id, 0, &[thought(1, "e1")]).await.unwrap();

        let err = repo.append_events(trace.trace_id, 0, &[thought(2, "e2")]).await.unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict { .. }));
        assert_eq!(repo.list_events(trace.trace_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_event_id_rolls_back() {
        let repo = setup().await;
        let trace = sample_trace();
        repo.create(&trace).await.unwrap();
        repo.append_events(trace.trace_id, 0, &[thought(1, "e1")]).await.unwrap();

        let err = repo
            .append_events(trace.trace_id, 1, &[thought(2, "e2"), thought(3, "e1")])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateEventIds(ids) if ids == vec!["e1".to_string()]));
        assert_eq!(repo.list_events(trace.trace_id).await.unwrap().len(), 1);
        assert_eq!(repo.get(trace.trace_id).await.unwrap().unwrap().seq_high, 1);
    }

    #[tokio::test]
    async fn test_existing_event_ids() {
        let repo = setup().await;
        let trace = sample_trace();
        repo.create(&trace).await.unwrap();
        repo.append_events(trace.trace_id, 0, &[thought(1, "e1"), thought(2, "e2")]).await.unwrap();

        let ids = ["e2".to_string(), "e9".to_string()];
        assert_eq!(repo.existing_event_ids(trace.trace_id, &ids).await.unwrap(), vec!["e2"]);
        assert!(repo.existing_event_ids(trace.trace_id, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_is_compare_and_swap() {
        let repo = setup().await;
        let trace = sample_trace();
        repo.create(&trace).await.unwrap();
        let final_state = FinalState {
            commit_head: Some("def456".to_string()),
            pr: None,
        };

        repo.begin_finalize(trace.trace_id, &final_state, 42).await.unwrap();
        let loaded = repo.get(trace.trace_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TraceStatus::Finalizing);
        assert_eq!(loaded.finalized_at_ms, Some(42));
        assert_eq!(loaded.final_state, Some(final_state.clone()));

        let err = repo.begin_finalize(trace.trace_id, &final_state, 43).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::UnexpectedStatus { actual: TraceStatus::Finalizing, .. }
        ));

        let err = repo.begin_finalize(Uuid::new_v4(), &final_state, 43).await.unwrap_err();
        assert!(matches!(err, DomainError::TraceNotFound(_)));
    }

    #[tokio::test]
    async fn test_qa_writes_require_finalizing() {
        let repo = setup().await;
        let trace = sample_trace();
        repo.create(&trace).await.unwrap();

        let err = repo.record_tests(trace.trace_id, &sample_tests()).await.unwrap_err();
        assert!(matches!(err, DomainError::UnexpectedStatus { actual: TraceStatus::Collecting, .. }));

        repo.begin_finalize(trace.trace_id, &FinalState::default(), 1).await.unwrap();
        repo.record_tests(trace.trace_id, &sample_tests()).await.unwrap();
        repo.mark_complete(trace.trace_id).await.unwrap();

        let loaded = repo.get(trace.trace_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TraceStatus::Complete);
        assert_eq!(loaded.qa.unwrap().tests, Some(sample_tests()));

        let err = repo.record_tests(trace.trace_id, &sample_tests()).await.unwrap_err();
        assert!(matches!(err, DomainError::UnexpectedStatus { actual: TraceStatus::Complete, .. }));
        assert!(!repo.mark_failed(trace.trace_id, "late").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_failed_records_error() {
        let repo = setup().await;
        let trace = sample_trace();
        repo.create(&trace).await.unwrap();
        repo.begin_finalize(trace.trace_id, &FinalState::default(), 1).await.unwrap();
        repo.record_tests(trace.trace_id, &sample_tests()).await.unwrap();

        assert!(repo.mark_failed(trace.trace_id, "evaluator exploded").await.unwrap());

        let loaded = repo.get(trace.trace_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TraceStatus::Failed);
        let qa = loaded.qa.unwrap();
        assert_eq!(qa.error.as_deref(), Some("evaluator exploded"));
        assert!(!qa.schema_valid);
        assert!(qa.tests.is_some());

        let err = repo.mark_complete(trace.trace_id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }
}
