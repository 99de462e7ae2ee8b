pub mod artifact_service;
pub mod ingestion_service;
pub mod qa_pipeline;
pub mod qa_worker;
pub mod redaction;

pub use artifact_service::ArtifactService;
pub use ingestion_service::IngestionService;
pub use qa_pipeline::{JobOutcome, PipelineSettings, QaPipeline};
pub use qa_worker::QaWorker;
pub use redaction::{apply_redaction, RedactionOutcome, Redactor};
