mod helpers;

use helpers::database::TestApp;
use helpers::fixtures::{batch, finalize_request, thought, trace_request, trace_request_without_judge_consent};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

use tracesmith::adapters::mock::{judge_response, MockEvaluator, MockRun, MockSandbox};
use tracesmith::domain::models::{
    Config, JobStatus, JudgeFlag, JudgeResult, JudgeScores, QaStage, Trace, TraceStatus, RUBRIC_VERSION,
};
use tracesmith::domain::ports::{JobQueue, TraceRepository};
use tracesmith::services::qa_pipeline::CONSENT_REFUSED_PREFIX;

/// Create a trace with one thought event and finalize it.
async fn finalized_trace(app: &TestApp, request: serde_json::Value) -> Uuid {
    let ingestion = &app.ctx.ingestion;
    let thought_blob = ingestion
        .upload_blob(b"The slice end index excludes the final page.", Some("text/plain"))
        .await
        .unwrap();
    let trace_id = ingestion.create_trace(&request).await.unwrap().trace_id;
    ingestion
        .append_events(trace_id, &batch(vec![thought(1, "t1", thought_blob.blob_id.as_str())]))
        .await
        .unwrap();
    ingestion.finalize(trace_id, &finalize_request()).await.unwrap();
    trace_id
}

async fn load(app: &TestApp, trace_id: Uuid) -> Trace {
    app.ctx.ingestion.get_trace(trace_id, false, true).await.unwrap()
}

async fn blob_text(app: &TestApp, blob_id: &str) -> String {
    String::from_utf8(app.ctx.ingestion.get_blob(blob_id).await.unwrap()).unwrap()
}

#[tokio::test]
async fn test_pipeline_completes_a_passing_trace() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;
    let sandbox = MockSandbox::default();
    let evaluator = MockEvaluator::default();

    let processed = app
        .worker(sandbox.clone(), evaluator.clone())
        .run_until_idle()
        .await
        .unwrap();
    assert_eq!(processed, 3);

    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Complete);
    let qa = trace.qa.unwrap();
    assert!(qa.error.is_none());

    let tests = qa.tests.unwrap();
    assert!(tests.final_passed);
    assert_eq!(tests.runner, "pytest -q");
    assert_eq!(tests.container_image.as_deref(), Some("python:3.12-slim"));
    assert_eq!(tests.invocations.len(), 1);
    let invocation = &tests.invocations[0];
    assert_eq!(invocation.exit_code, 0);
    assert!(invocation.stderr_blob_id.is_none());
    let stdout = invocation.stdout_blob_id.as_deref().unwrap();
    assert_eq!(blob_text(&app, stdout).await, "1 passed\n");

    let judge = qa.judge.unwrap();
    assert_eq!(judge.model, "mock-evaluator");
    assert_eq!(judge.rubric_version, RUBRIC_VERSION);
    assert!((judge.overall - 4.0).abs() < f64::EPSILON);
    let rationale = judge.rationale_blob_id.as_deref().unwrap();
    assert_eq!(blob_text(&app, rationale).await, "Methodical debugging with a minimal fix.");

    let jobs = app.ctx.queue.list_for_trace(trace_id).await.unwrap();
    let stages: Vec<QaStage> = jobs.iter().map(|j| j.stage).collect();
    assert_eq!(stages, vec![QaStage::RunTests, QaStage::RunJudge, QaStage::FinalizeQa]);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Succeeded && j.attempts == 1));
}

#[tokio::test]
async fn test_sandbox_receives_trace_context() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;
    let sandbox = MockSandbox::default();

    app.worker(sandbox.clone(), MockEvaluator::default())
        .run_until_idle()
        .await
        .unwrap();

    let calls = sandbox.calls().await;
    assert_eq!(calls.len(), 1);
    let spec = &calls[0];
    assert_eq!(spec.command, "pytest -q");
    assert_eq!(spec.timeout, Duration::from_secs(300));
    assert!(spec.env.contains(&("TRACE_ID".to_string(), trace_id.to_string())));
    assert!(spec.env.contains(&("TRACE_COMMIT_BASE".to_string(), "4f2a9c1".to_string())));
    assert!(spec.env.contains(&("TRACE_COMMIT_HEAD".to_string(), "abc".to_string())));
}

#[tokio::test]
async fn test_evaluation_packet_digest() {
    let app = TestApp::new().await;
    finalized_trace(&app, trace_request()).await;
    let evaluator = MockEvaluator::default();

    app.worker(MockSandbox::default(), evaluator.clone())
        .run_until_idle()
        .await
        .unwrap();

    let prompts = evaluator.prompts().await;
    assert_eq!(prompts.len(), 1);
    let (system, user) = &prompts[0];
    assert!(system.contains("root_cause_identification"));
    assert!(user.starts_with("Please evaluate the following bug-fix trace:"));
    assert!(user.contains("**Title:** Pagination drops the last item"));
    assert!(user.contains("**thought** (hypothesis): The slice end index excludes the final page."));
    assert!(user.contains("**Final commit:** abc"));
    assert!(user.contains("**Final passed:** true"));
}

#[tokio::test]
async fn test_sandbox_timeout_still_reaches_the_judge() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;

    app.worker(MockSandbox::new(MockRun::Timeout), MockEvaluator::default())
        .run_until_idle()
        .await
        .unwrap();

    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Complete);
    let qa = trace.qa.unwrap();
    let tests = qa.tests.unwrap();
    assert!(!tests.final_passed);
    let invocation = &tests.invocations[0];
    assert!(!invocation.passed);
    assert_ne!(invocation.exit_code, 0);
    let stderr = invocation.stderr_blob_id.as_deref().unwrap();
    assert!(!blob_text(&app, stderr).await.is_empty());
    assert!(qa.judge.is_some());
}

#[tokio::test]
async fn test_failing_tests_are_recorded_not_fatal() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;

    app.worker(
        MockSandbox::new(MockRun::failing(2, "AssertionError: 2 != 3")),
        MockEvaluator::default(),
    )
    .run_until_idle()
    .await
    .unwrap();

    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Complete);
    let tests = trace.qa.unwrap().tests.unwrap();
    assert!(!tests.final_passed);
    assert_eq!(tests.invocations[0].exit_code, 2);
    let stderr = tests.invocations[0].stderr_blob_id.as_deref().unwrap();
    assert_eq!(blob_text(&app, stderr).await, "AssertionError: 2 != 3");
}

#[tokio::test]
async fn test_non_json_evaluator_answer_fails_the_trace() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;

    let processed = app
        .worker(MockSandbox::default(), MockEvaluator::responding("Looks solid to me!"))
        .run_until_idle()
        .await
        .unwrap();
    assert_eq!(processed, 2, "finalize_qa is never enqueued");

    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Failed);
    let qa = trace.qa.unwrap();
    assert!(qa.judge.is_none());
    assert!(qa.tests.is_some());
    assert!(!qa.schema_valid);
    assert!(qa.error.unwrap().starts_with("Evaluator returned invalid JSON"));

    let jobs = app.ctx.queue.list_for_trace(trace_id).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].status, JobStatus::Failed);
    assert!(jobs[1].error.is_some());
}

#[tokio::test]
async fn test_out_of_range_scores_fail_the_trace() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;

    app.worker(MockSandbox::default(), MockEvaluator::responding(judge_response(9.0, "too generous")))
        .run_until_idle()
        .await
        .unwrap();

    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Failed);
    assert!(trace.qa.unwrap().error.unwrap().starts_with("Evaluator response failed validation"));
}

#[tokio::test]
async fn test_fenced_answer_with_flags_is_accepted() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;
    let mut answer: serde_json::Value = serde_json::from_str(&judge_response(3.0, "ok")).unwrap();
    answer["flags"] = serde_json::json!(["incomplete_fix"]);
    let fenced = format!("```json\n{answer}\n```");

    app.worker(MockSandbox::default(), MockEvaluator::responding(fenced))
        .run_until_idle()
        .await
        .unwrap();

    let judge = load(&app, trace_id).await.qa.unwrap().judge.unwrap();
    assert_eq!(judge.flags, vec![JudgeFlag::IncompleteFix]);
}

#[tokio::test]
async fn test_evaluator_transport_failure_fails_the_trace() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;

    app.worker(MockSandbox::default(), MockEvaluator::failing("connection reset"))
        .run_until_idle()
        .await
        .unwrap();

    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Failed);
    let error = trace.qa.unwrap().error.unwrap();
    assert!(error.starts_with("Evaluator request failed"));
    assert!(!error.starts_with(CONSENT_REFUSED_PREFIX));
    assert!(error.contains("connection reset"));
}

#[tokio::test]
async fn test_judge_respects_developer_consent() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request_without_judge_consent()).await;
    let evaluator = MockEvaluator::default();

    app.worker(MockSandbox::default(), evaluator.clone())
        .run_until_idle()
        .await
        .unwrap();

    assert!(evaluator.prompts().await.is_empty());
    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Failed);
    let qa = trace.qa.unwrap();
    assert!(qa.tests.is_some(), "tests still run without judge consent");
    assert!(qa.judge.is_none());
    let error = qa.error.unwrap();
    assert!(error.starts_with(CONSENT_REFUSED_PREFIX));
    assert!(error.contains("allow_llm_judge=false"));
}

#[tokio::test]
async fn test_finalize_stage_requires_test_results() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;

    // Retire the queued test job by hand so only finalize_qa runs.
    let test_job = app.ctx.queue.claim_next().await.unwrap().unwrap();
    app.ctx.queue.mark_succeeded(test_job.job_id).await.unwrap();

    let judge = JudgeResult {
        model: "mock-evaluator".to_string(),
        rubric_version: RUBRIC_VERSION.to_string(),
        scores: JudgeScores {
            root_cause_identification: 4.0,
            plan_quality: 4.0,
            experiment_iterate_loop: 4.0,
            use_of_signals_tests_logs: 4.0,
            minimality_of_fix: 4.0,
            clarity: 4.0,
        },
        overall: 4.0,
        rationale_blob_id: None,
        flags: vec![],
    };
    app.ctx.traces.record_judge(trace_id, &judge).await.unwrap();
    app.ctx.queue.enqueue(QaStage::FinalizeQa, trace_id).await.unwrap();

    let processed = app
        .worker(MockSandbox::default(), MockEvaluator::default())
        .run_until_idle()
        .await
        .unwrap();
    assert_eq!(processed, 1);

    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Failed);
    assert_eq!(trace.qa.unwrap().error.unwrap(), format!("Trace {trace_id} missing qa.tests"));
}

#[tokio::test]
async fn test_terminal_traces_are_not_mutated_by_stray_jobs() {
    let app = TestApp::new().await;
    let trace_id = finalized_trace(&app, trace_request()).await;
    let worker = app.worker(MockSandbox::default(), MockEvaluator::default());
    worker.run_until_idle().await.unwrap();

    let stray = app.ctx.queue.enqueue(QaStage::RunJudge, trace_id).await.unwrap();
    worker.run_until_idle().await.unwrap();

    let job = app.ctx.queue.get(stray).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let trace = load(&app, trace_id).await;
    assert_eq!(trace.status, TraceStatus::Complete);
    assert!(trace.qa.unwrap().error.is_none());
}

#[tokio::test]
async fn test_worker_loop_processes_jobs_until_shutdown() {
    let mut config = Config::default();
    config.worker.poll_interval_ms = 10;
    let app = TestApp::with_config(config).await;
    let trace_id = finalized_trace(&app, trace_request()).await;

    let worker = app.worker(MockSandbox::default(), MockEvaluator::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    let mut status = TraceStatus::Finalizing;
    for _ in 0..200 {
        status = load(&app, trace_id).await.status;
        if status == TraceStatus::Complete {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, TraceStatus::Complete);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker should stop after shutdown")
        .unwrap()
        .unwrap();
}
