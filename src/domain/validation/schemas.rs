//! Static schema tables for every validated request shape.

use super::{FieldKind, FieldSpec};
use crate::domain::models::event::{
    ActorKind, EditKind, EventType, Shell, SnapshotReason, Stream, TestRunner, ThoughtKind,
};
use crate::domain::models::qa::JudgeFlag;
use crate::domain::models::trace::ExperienceLevel;

use super::FieldKind::{AnyObject, Bool, IntPair, Object, OneOf, OneOfList, Str, StrList};

const NON_NEGATIVE: FieldKind = FieldKind::Int { min: Some(0) };
const POSITIVE: FieldKind = FieldKind::Int { min: Some(1) };
const ANY_INT: FieldKind = FieldKind::Int { min: None };
const SCORE: FieldKind = FieldKind::Float { min: 0.0, max: 5.0 };

// Trace creation

const REPO_FINGERPRINT: &[FieldSpec] = &[
    FieldSpec::optional("tree_hash", Str),
    FieldSpec::optional("dependencies_lock_hash", Str),
];

const REPO: &[FieldSpec] = &[
    FieldSpec::required("repo_id", Str),
    FieldSpec::optional("remote_url", Str),
    FieldSpec::optional("default_branch", Str),
    FieldSpec::required("commit_base", Str),
    FieldSpec::optional("repo_fingerprint", Object(REPO_FINGERPRINT)),
];

const BUG_REPORT: &[FieldSpec] = &[
    FieldSpec::required("title", Str),
    FieldSpec::required("description", Str),
    FieldSpec::optional("repro_steps", Str),
    FieldSpec::optional("expected", Str),
    FieldSpec::optional("actual", Str),
    FieldSpec::optional("links", StrList),
];

const TASK: &[FieldSpec] = &[
    FieldSpec::optional("task_id", Str),
    FieldSpec::required("bug_report", Object(BUG_REPORT)),
    FieldSpec::optional("labels", StrList),
];

const CONSENT_FLAGS: &[FieldSpec] = &[
    FieldSpec::optional("store_raw_code", Bool),
    FieldSpec::optional("store_terminal_output", Bool),
    FieldSpec::optional("allow_llm_judge", Bool),
];

const DEVELOPER: &[FieldSpec] = &[
    FieldSpec::required("developer_id", Str),
    FieldSpec::optional("experience_level", OneOf(ExperienceLevel::VARIANTS)),
    FieldSpec::optional("consent_flags", Object(CONSENT_FLAGS)),
];

const IDE: &[FieldSpec] = &[
    FieldSpec::required("name", Str),
    FieldSpec::optional("version", Str),
];

const ENVIRONMENT: &[FieldSpec] = &[
    FieldSpec::optional("os", Str),
    FieldSpec::required("ide", Object(IDE)),
    FieldSpec::optional("language", StrList),
    FieldSpec::optional("containerized", Bool),
    FieldSpec::optional("timezone", Str),
];

pub const TRACE_CREATE: &[FieldSpec] = &[
    FieldSpec::required("repo", Object(REPO)),
    FieldSpec::required("task", Object(TASK)),
    FieldSpec::required("developer", Object(DEVELOPER)),
    FieldSpec::required("environment", Object(ENVIRONMENT)),
];

// Finalize

const PR_FINAL_STATE: &[FieldSpec] = &[
    FieldSpec::optional("title", Str),
    FieldSpec::optional("description", Str),
    FieldSpec::optional("diff_blob_id", Str),
];

const FINAL_STATE: &[FieldSpec] = &[
    FieldSpec::optional("commit_head", Str),
    FieldSpec::optional("pr", Object(PR_FINAL_STATE)),
];

pub const FINALIZE: &[FieldSpec] = &[FieldSpec::required("final_state", Object(FINAL_STATE))];

// Event envelope

const ACTOR: &[FieldSpec] = &[
    FieldSpec::required("kind", OneOf(ActorKind::VARIANTS)),
    FieldSpec::optional("id", Str),
];

const EVENT_CONTEXT: &[FieldSpec] = &[
    FieldSpec::optional("workspace_root", Str),
    FieldSpec::optional("branch", Str),
    FieldSpec::optional("commit_head", Str),
    FieldSpec::optional("correlation_id", Str),
    FieldSpec::optional("parent_event_id", Str),
];

pub const EVENT_ENVELOPE: &[FieldSpec] = &[
    FieldSpec::optional("event_id", Str),
    FieldSpec::required("seq", POSITIVE),
    FieldSpec::required("ts_ms", NON_NEGATIVE),
    FieldSpec::required("type", OneOf(EventType::VARIANTS)),
    FieldSpec::required("actor", Object(ACTOR)),
    FieldSpec::optional("context", Object(EVENT_CONTEXT)),
    FieldSpec::required("payload", AnyObject),
];

// Event payloads

const SELECTION: &[FieldSpec] = &[
    FieldSpec::required("start", IntPair),
    FieldSpec::required("end", IntPair),
];

const FILE_EDIT: &[FieldSpec] = &[
    FieldSpec::required("file_path", Str),
    FieldSpec::required("edit_kind", OneOf(EditKind::VARIANTS)),
    FieldSpec::optional("patch_format", Str),
    FieldSpec::required("patch_blob_id", Str),
    FieldSpec::optional("pre_hash", Str),
    FieldSpec::optional("post_hash", Str),
    FieldSpec::optional("selection", Object(SELECTION)),
    FieldSpec::optional("reason_ref", Str),
];

const FILE_SNAPSHOT: &[FieldSpec] = &[
    FieldSpec::required("file_path", Str),
    FieldSpec::required("content_blob_id", Str),
    FieldSpec::required("snapshot_reason", OneOf(SnapshotReason::VARIANTS)),
];

const TERMINAL_COMMAND: &[FieldSpec] = &[
    FieldSpec::required("cwd", Str),
    FieldSpec::required("command", Str),
    FieldSpec::optional("shell", OneOf(Shell::VARIANTS)),
    FieldSpec::optional("env_hash", Str),
];

const TERMINAL_OUTPUT: &[FieldSpec] = &[
    FieldSpec::required("stream", OneOf(Stream::VARIANTS)),
    FieldSpec::required("chunk_blob_id", Str),
    FieldSpec::optional("is_truncated", Bool),
];

const TEST_RUN: &[FieldSpec] = &[
    FieldSpec::required("command", Str),
    FieldSpec::required("runner", OneOf(TestRunner::VARIANTS)),
    FieldSpec::required("exit_code", ANY_INT),
    FieldSpec::required("duration_ms", NON_NEGATIVE),
    FieldSpec::required("passed", Bool),
    FieldSpec::optional("report_blob_id", Str),
];

const DEBUG_ACTION: &[FieldSpec] = &[
    FieldSpec::required("action", Str),
    FieldSpec::optional("details", AnyObject),
];

const NAVIGATION: &[FieldSpec] = &[
    FieldSpec::required("file_path", Str),
    FieldSpec::optional("symbol", Str),
    FieldSpec::optional("line", ANY_INT),
];

const THOUGHT: &[FieldSpec] = &[
    FieldSpec::required("content_blob_id", Str),
    FieldSpec::required("kind", OneOf(ThoughtKind::VARIANTS)),
    FieldSpec::optional("links_to", StrList),
];

const COMMIT: &[FieldSpec] = &[
    FieldSpec::required("commit_sha", Str),
    FieldSpec::required("message", Str),
    FieldSpec::optional("parent_shas", StrList),
];

const PR_METADATA: &[FieldSpec] = &[
    FieldSpec::optional("title", Str),
    FieldSpec::optional("description", Str),
    FieldSpec::optional("diff_blob_id", Str),
    FieldSpec::optional("pr_url", Str),
];

const ERROR: &[FieldSpec] = &[
    FieldSpec::required("error_type", Str),
    FieldSpec::required("message", Str),
    FieldSpec::optional("stacktrace_blob_id", Str),
];

/// Payload schema selected by the event type.
pub fn payload_schema(event_type: EventType) -> &'static [FieldSpec] {
    match event_type {
        EventType::FileEdit => FILE_EDIT,
        EventType::FileSnapshot => FILE_SNAPSHOT,
        EventType::TerminalCommand => TERMINAL_COMMAND,
        EventType::TerminalOutput => TERMINAL_OUTPUT,
        EventType::TestRun => TEST_RUN,
        EventType::DebugAction => DEBUG_ACTION,
        EventType::Navigation => NAVIGATION,
        EventType::Thought => THOUGHT,
        EventType::Commit => COMMIT,
        EventType::PrMetadata => PR_METADATA,
        EventType::Error => ERROR,
    }
}

// Evaluator output

const JUDGE_SCORES: &[FieldSpec] = &[
    FieldSpec::required("root_cause_identification", SCORE),
    FieldSpec::required("plan_quality", SCORE),
    FieldSpec::required("experiment_iterate_loop", SCORE),
    FieldSpec::required("use_of_signals_tests_logs", SCORE),
    FieldSpec::required("minimality_of_fix", SCORE),
    FieldSpec::required("clarity", SCORE),
];

pub const JUDGE_OUTPUT: &[FieldSpec] = &[
    FieldSpec::required("scores", Object(JUDGE_SCORES)),
    FieldSpec::required("overall", SCORE),
    FieldSpec::required("rationale", Str),
    FieldSpec::optional("flags", OneOfList(JudgeFlag::VARIANTS)),
];
