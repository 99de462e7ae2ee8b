//! Tracesmith - bug-fix trace ingestion with automated QA
//!
//! Developers' bug-fixing sessions arrive as traces: a bug report, an ordered
//! stream of typed events and content-addressed blobs. A finalized trace runs
//! through a three-stage QA pipeline (sandboxed test run, rubric evaluation,
//! completion) driven by a persistent job queue.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): data model, validation, errors and port traits
//! - **Service Layer** (`services`): ingestion, redaction and the QA pipeline
//! - **Adapters** (`adapters`): SQLite, filesystem blobs, Docker, HTTP evaluator
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use tracesmith::cli::AppContext;
//! use tracesmith::infrastructure::config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = AppContext::open(ConfigLoader::load()?).await?;
//!     ctx.worker()?.run_until_idle().await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult, ErrorKind};
pub use domain::models::{
    BlobId, BlobRef, Config, Event, QaJob, QaStage, Trace, TraceStatus,
};
pub use domain::ports::{ArtifactStore, Evaluator, JobQueue, Sandbox, TraceRepository};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ArtifactService, IngestionService, QaPipeline, QaWorker};
