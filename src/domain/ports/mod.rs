//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that infrastructure adapters implement:
//! - ArtifactStore: content-addressed blob bytes
//! - TraceRepository / BlobRepository: durable trace, event and blob metadata state
//! - JobQueue: QA pipeline stage jobs
//! - Sandbox: isolated test execution
//! - Evaluator: automated rubric scoring

pub mod artifact_store;
pub mod blob_repository;
pub mod evaluator;
pub mod job_queue;
pub mod sandbox;
pub mod trace_repository;

pub use artifact_store::ArtifactStore;
pub use blob_repository::BlobRepository;
pub use evaluator::{Evaluator, EvaluatorError};
pub use job_queue::JobQueue;
pub use sandbox::{Sandbox, SandboxError, SandboxOutcome, SandboxSpec};
pub use trace_repository::TraceRepository;
