//! Service wiring shared by every command that touches the database.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::blob_store::LocalFsArtifactStore;
use crate::adapters::evaluator::AnthropicEvaluator;
use crate::adapters::sandbox::DockerSandbox;
use crate::adapters::sqlite::{
    initialize_database, PoolConfig, SqliteBlobRepository, SqliteJobQueue, SqliteTraceRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::{JobQueue, TraceRepository};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{ArtifactService, IngestionService, PipelineSettings, QaPipeline, QaWorker};

/// Load configuration from `path` when given, otherwise from the project
/// directory and environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Repositories and services over one database pool.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub traces: Arc<dyn TraceRepository>,
    pub queue: Arc<dyn JobQueue>,
    pub artifacts: ArtifactService,
    pub ingestion: IngestionService,
}

impl AppContext {
    /// Open the configured database, applying pending migrations.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_database(
            &config.database.url(),
            Some(PoolConfig::from(&config.database)),
        )
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        Ok(Self::from_pool(config, pool))
    }

    pub fn from_pool(config: Config, pool: SqlitePool) -> Self {
        let traces: Arc<dyn TraceRepository> = Arc::new(SqliteTraceRepository::new(pool.clone()));
        let queue: Arc<dyn JobQueue> = Arc::new(SqliteJobQueue::new(pool.clone()));
        let artifacts = ArtifactService::from_config(
            Arc::new(LocalFsArtifactStore::new(&config.blob_store.root)),
            Arc::new(SqliteBlobRepository::new(pool.clone())),
            &config.redaction,
        );
        let ingestion = IngestionService::new(traces.clone(), queue.clone(), artifacts.clone());

        Self {
            config,
            pool,
            traces,
            queue,
            artifacts,
            ingestion,
        }
    }

    /// Build a worker backed by the Docker sandbox and the HTTP evaluator.
    pub fn worker(&self) -> Result<QaWorker> {
        let evaluator = AnthropicEvaluator::from_config(&self.config.judge)
            .context("Failed to create evaluator client")?;
        let pipeline = QaPipeline::new(
            self.traces.clone(),
            self.queue.clone(),
            self.artifacts.clone(),
            Arc::new(DockerSandbox::from_config(&self.config.sandbox)),
            Arc::new(evaluator),
            PipelineSettings::from_config(&self.config),
        );
        Ok(QaWorker::new(
            self.queue.clone(),
            Arc::new(pipeline),
            &self.config.worker,
        ))
    }
}
