//! Event domain model.
//!
//! Events are the timestamped, typed actions that make up a trace. The payload
//! shape is selected by the event type; the closed set of shapes is modelled as
//! [`EventPayload`] and parsed by dispatching on [`EventType`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Closed set of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FileEdit,
    FileSnapshot,
    TerminalCommand,
    TerminalOutput,
    TestRun,
    DebugAction,
    Navigation,
    Thought,
    Commit,
    PrMetadata,
    Error,
}

impl EventType {
    pub const VARIANTS: &'static [&'static str] = &[
        "file_edit",
        "file_snapshot",
        "terminal_command",
        "terminal_output",
        "test_run",
        "debug_action",
        "navigation",
        "thought",
        "commit",
        "pr_metadata",
        "error",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileEdit => "file_edit",
            Self::FileSnapshot => "file_snapshot",
            Self::TerminalCommand => "terminal_command",
            Self::TerminalOutput => "terminal_output",
            Self::TestRun => "test_run",
            Self::DebugAction => "debug_action",
            Self::Navigation => "navigation",
            Self::Thought => "thought",
            Self::Commit => "commit",
            Self::PrMetadata => "pr_metadata",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file_edit" => Some(Self::FileEdit),
            "file_snapshot" => Some(Self::FileSnapshot),
            "terminal_command" => Some(Self::TerminalCommand),
            "terminal_output" => Some(Self::TerminalOutput),
            "test_run" => Some(Self::TestRun),
            "debug_action" => Some(Self::DebugAction),
            "navigation" => Some(Self::Navigation),
            "thought" => Some(Self::Thought),
            "commit" => Some(Self::Commit),
            "pr_metadata" => Some(Self::PrMetadata),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Human,
    Tool,
    Ide,
}

impl ActorKind {
    pub const VARIANTS: &'static [&'static str] = &["human", "tool", "ide"];
}

/// Who produced the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorKind,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    #[serde(default)]
    pub workspace_root: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_head: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub parent_event_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    Patch,
    ReplaceRange,
    KeystrokeBatch,
}

impl EditKind {
    pub const VARIANTS: &'static [&'static str] = &["patch", "replace_range", "keystroke_batch"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::ReplaceRange => "replace_range",
            Self::KeystrokeBatch => "keystroke_batch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotReason {
    PreTest,
    PostTest,
    ManualCheckpoint,
}

impl SnapshotReason {
    pub const VARIANTS: &'static [&'static str] = &["pre_test", "post_test", "manual_checkpoint"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shell {
    #[default]
    Bash,
    Zsh,
    Pwsh,
    Cmd,
}

impl Shell {
    pub const VARIANTS: &'static [&'static str] = &["bash", "zsh", "pwsh", "cmd"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub const VARIANTS: &'static [&'static str] = &["stdout", "stderr"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestRunner {
    #[serde(rename = "pytest")]
    Pytest,
    #[serde(rename = "go test")]
    GoTest,
    #[serde(rename = "npm test")]
    NpmTest,
    #[serde(rename = "make test")]
    MakeTest,
    #[serde(rename = "custom")]
    Custom,
}

impl TestRunner {
    pub const VARIANTS: &'static [&'static str] =
        &["pytest", "go test", "npm test", "make test", "custom"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtKind {
    Hypothesis,
    Plan,
    Interpretation,
    Decision,
    Postmortem,
}

impl ThoughtKind {
    pub const VARIANTS: &'static [&'static str] =
        &["hypothesis", "plan", "interpretation", "decision", "postmortem"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hypothesis => "hypothesis",
            Self::Plan => "plan",
            Self::Interpretation => "interpretation",
            Self::Decision => "decision",
            Self::Postmortem => "postmortem",
        }
    }
}

/// Editor selection as `[line, column]` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: [i64; 2],
    pub end: [i64; 2],
}

fn default_patch_format() -> String {
    "unified_diff".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEditPayload {
    pub file_path: String,
    pub edit_kind: EditKind,
    #[serde(default = "default_patch_format")]
    pub patch_format: String,
    pub patch_blob_id: String,
    #[serde(default)]
    pub pre_hash: Option<String>,
    #[serde(default)]
    pub post_hash: Option<String>,
    #[serde(default)]
    pub selection: Option<SelectionRange>,
    #[serde(default)]
    pub reason_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshotPayload {
    pub file_path: String,
    pub content_blob_id: String,
    pub snapshot_reason: SnapshotReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalCommandPayload {
    pub cwd: String,
    pub command: String,
    #[serde(default)]
    pub shell: Shell,
    #[serde(default)]
    pub env_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalOutputPayload {
    pub stream: Stream,
    pub chunk_blob_id: String,
    #[serde(default)]
    pub is_truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunPayload {
    pub command: String,
    pub runner: TestRunner,
    pub exit_code: i64,
    pub duration_ms: u64,
    pub passed: bool,
    #[serde(default)]
    pub report_blob_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugActionPayload {
    pub action: String,
    #[serde(default)]
    pub details: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationPayload {
    pub file_path: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub line: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThoughtPayload {
    pub content_blob_id: String,
    pub kind: ThoughtKind,
    #[serde(default)]
    pub links_to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPayload {
    pub commit_sha: String,
    pub message: String,
    #[serde(default)]
    pub parent_shas: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrMetadataPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub diff_blob_id: Option<String>,
    #[serde(default)]
    pub pr_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error_type: String,
    pub message: String,
    #[serde(default)]
    pub stacktrace_blob_id: Option<String>,
}

/// Typed payload, one variant per [`EventType`].
///
/// Serialized untagged: the event's `type` field carries the discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    FileEdit(FileEditPayload),
    FileSnapshot(FileSnapshotPayload),
    TerminalCommand(TerminalCommandPayload),
    TerminalOutput(TerminalOutputPayload),
    TestRun(TestRunPayload),
    DebugAction(DebugActionPayload),
    Navigation(NavigationPayload),
    Thought(ThoughtPayload),
    Commit(CommitPayload),
    PrMetadata(PrMetadataPayload),
    Error(ErrorPayload),
}

impl EventPayload {
    /// Parse a raw payload object into the shape selected by `event_type`.
    ///
    /// Unknown keys are ignored and defaults are filled in.
    pub fn from_value(event_type: EventType, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            EventType::FileEdit => Self::FileEdit(serde_json::from_value(value)?),
            EventType::FileSnapshot => Self::FileSnapshot(serde_json::from_value(value)?),
            EventType::TerminalCommand => Self::TerminalCommand(serde_json::from_value(value)?),
            EventType::TerminalOutput => Self::TerminalOutput(serde_json::from_value(value)?),
            EventType::TestRun => Self::TestRun(serde_json::from_value(value)?),
            EventType::DebugAction => Self::DebugAction(serde_json::from_value(value)?),
            EventType::Navigation => Self::Navigation(serde_json::from_value(value)?),
            EventType::Thought => Self::Thought(serde_json::from_value(value)?),
            EventType::Commit => Self::Commit(serde_json::from_value(value)?),
            EventType::PrMetadata => Self::PrMetadata(serde_json::from_value(value)?),
            EventType::Error => Self::Error(serde_json::from_value(value)?),
        })
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::FileEdit(_) => EventType::FileEdit,
            Self::FileSnapshot(_) => EventType::FileSnapshot,
            Self::TerminalCommand(_) => EventType::TerminalCommand,
            Self::TerminalOutput(_) => EventType::TerminalOutput,
            Self::TestRun(_) => EventType::TestRun,
            Self::DebugAction(_) => EventType::DebugAction,
            Self::Navigation(_) => EventType::Navigation,
            Self::Thought(_) => EventType::Thought,
            Self::Commit(_) => EventType::Commit,
            Self::PrMetadata(_) => EventType::PrMetadata,
            Self::Error(_) => EventType::Error,
        }
    }
}

/// One timestamped, typed action within a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    pub event_id: String,
    pub seq: u64,
    pub ts_ms: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub actor: Actor,
    pub context: Option<EventContext>,
    pub payload: EventPayload,
}

/// Event envelope with its payload still untyped.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event_id: Option<String>,
    pub seq: u64,
    pub ts_ms: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub actor: Actor,
    #[serde(default)]
    pub context: Option<EventContext>,
    pub payload: Value,
}

impl TryFrom<RawEvent> for Event {
    type Error = serde_json::Error;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let payload = EventPayload::from_value(raw.event_type, raw.payload)?;
        Ok(Self {
            event_id: raw.event_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            seq: raw.seq,
            ts_ms: raw.ts_ms,
            event_type: raw.event_type,
            actor: raw.actor,
            context: raw.context,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_round_trips_through_str() {
        for name in EventType::VARIANTS {
            let ty = EventType::from_str(name).unwrap();
            assert_eq!(ty.as_str(), *name);
        }
        assert_eq!(EventType::from_str("keypress"), None);
    }

    #[test]
    fn test_payload_defaults_are_filled() {
        let payload = EventPayload::from_value(
            EventType::FileEdit,
            json!({"file_path": "src/a.py", "edit_kind": "patch", "patch_blob_id": "sha256:ab"}),
        )
        .unwrap();
        let EventPayload::FileEdit(edit) = payload else {
            panic!("expected file_edit payload");
        };
        assert_eq!(edit.patch_format, "unified_diff");

        let payload = EventPayload::from_value(
            EventType::TerminalCommand,
            json!({"cwd": "/repo", "command": "ls"}),
        )
        .unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["shell"], "bash");
    }

    #[test]
    fn test_payload_ignores_unknown_keys() {
        let payload = EventPayload::from_value(
            EventType::Commit,
            json!({"commit_sha": "deadbeef", "message": "fix", "author": "someone"}),
        )
        .unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("author").is_none());
        assert_eq!(value["parent_shas"], json!([]));
    }

    #[test]
    fn test_test_runner_uses_spaced_names() {
        let payload = EventPayload::from_value(
            EventType::TestRun,
            json!({"command": "go test ./...", "runner": "go test", "exit_code": 0,
                   "duration_ms": 10, "passed": true}),
        )
        .unwrap();
        assert_eq!(payload.event_type(), EventType::TestRun);
        assert_eq!(serde_json::to_value(&payload).unwrap()["runner"], "go test");
    }

    #[test]
    fn test_event_deserializes_and_generates_id() {
        let event: Event = serde_json::from_value(json!({
            "seq": 1,
            "ts_ms": 5,
            "type": "thought",
            "actor": {"kind": "human"},
            "payload": {"content_blob_id": "sha256:aa", "kind": "hypothesis"}
        }))
        .unwrap();
        assert_eq!(event.seq, 1);
        assert!(Uuid::parse_str(&event.event_id).is_ok());
        assert!(matches!(event.payload, EventPayload::Thought(_)));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "thought");
        assert_eq!(value["payload"]["links_to"], json!([]));
    }
}
