use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

use tracesmith::adapters::mock::{MockEvaluator, MockSandbox};
use tracesmith::adapters::sqlite::create_migrated_test_pool;
use tracesmith::cli::AppContext;
use tracesmith::domain::models::Config;
use tracesmith::services::{PipelineSettings, QaPipeline, QaWorker};

/// Create an in-memory SQLite database for testing
///
/// Each call creates an isolated database with all migrations applied.
pub async fn setup_test_db() -> SqlitePool {
    create_migrated_test_pool()
        .await
        .expect("failed to create migrated test database")
}

/// Close the pool at the end of a test.
pub async fn teardown_test_db(pool: SqlitePool) {
    pool.close().await;
}

/// Fully wired services over an in-memory database and a temporary blob root.
pub struct TestApp {
    pub ctx: AppContext,
    _blob_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(mut config: Config) -> Self {
        let blob_dir = tempfile::tempdir().expect("failed to create blob dir");
        config.blob_store.root = blob_dir.path().to_string_lossy().to_string();
        let ctx = AppContext::from_pool(config, setup_test_db().await);
        Self {
            ctx,
            _blob_dir: blob_dir,
        }
    }

    /// A worker whose sandbox and evaluator are test doubles.
    pub fn worker(&self, sandbox: MockSandbox, evaluator: MockEvaluator) -> QaWorker {
        let pipeline = QaPipeline::new(
            self.ctx.traces.clone(),
            self.ctx.queue.clone(),
            self.ctx.artifacts.clone(),
            Arc::new(sandbox),
            Arc::new(evaluator),
            PipelineSettings::from_config(&self.ctx.config),
        );
        QaWorker::new(self.ctx.queue.clone(), Arc::new(pipeline), &self.ctx.config.worker)
    }
}
