pub mod blob;
pub mod config;
pub mod event;
pub mod job;
pub mod qa;
pub mod trace;

pub use blob::{BlobId, BlobRedaction, BlobRef, RedactionRule, DEFAULT_CONTENT_TYPE};
pub use config::{
    BlobStoreConfig, Config, DatabaseConfig, JudgeConfig, LoggingConfig, RedactionConfig,
    SandboxConfig, WorkerConfig,
};
pub use event::{
    Actor, ActorKind, Event, EventContext, EventPayload, EventType, RawEvent,
};
pub use job::{JobStatus, QaJob, QaStage};
pub use qa::{
    JudgeFlag, JudgeOutput, JudgeResult, JudgeScores, Qa, QaTests, TestInvocation, RUBRIC_VERSION,
};
pub use trace::{
    BugReport, ConsentFlags, Developer, Environment, EventsAccepted, ExperienceLevel, FinalState,
    FinalizeRequest, Ide, PrFinalState, Repo, RepoFingerprint, Trace, TraceCreate, TraceCreated,
    TraceFinalized, TraceStatus, TraceTask, TRACE_VERSION,
};
