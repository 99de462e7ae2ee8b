use serde::{Deserialize, Serialize};

use super::blob::RedactionRule;

/// Main configuration structure for tracesmith
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Content-addressed blob store configuration
    #[serde(default)]
    pub blob_store: BlobStoreConfig,

    /// Redaction applied to stored artifacts
    #[serde(default)]
    pub redaction: RedactionConfig,

    /// Test sandbox configuration
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Automated evaluator configuration
    #[serde(default)]
    pub judge: JudgeConfig,

    /// QA worker configuration
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".tracesmith/tracesmith.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// `sqlx` connection URL for the configured path.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// Blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BlobStoreConfig {
    /// Root directory; blobs live under `{root}/sha256/`
    #[serde(default = "default_blob_root")]
    pub root: String,
}

fn default_blob_root() -> String {
    ".tracesmith/blobs".to_string()
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            root: default_blob_root(),
        }
    }
}

/// Redaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RedactionConfig {
    /// Rules applied to uploaded blobs
    #[serde(default = "default_redaction_rules")]
    pub rules: Vec<RedactionRule>,

    /// Byte cap enforced by `truncate_large`
    #[serde(default = "default_max_blob_bytes")]
    pub max_blob_bytes: usize,
}

fn default_redaction_rules() -> Vec<RedactionRule> {
    RedactionRule::ALL.to_vec()
}

const fn default_max_blob_bytes() -> usize {
    1_048_576
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            rules: default_redaction_rules(),
            max_blob_bytes: default_max_blob_bytes(),
        }
    }
}

/// Test sandbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxConfig {
    /// Container runtime binary
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    /// Base image the tests run in
    #[serde(default = "default_image")]
    pub image: String,

    /// Shell command that runs the test suite
    #[serde(default = "default_test_command")]
    pub test_command: String,

    /// Wall-clock limit for one run
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Container memory ceiling, e.g. `512m`
    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,

    /// Host directory mounted read-only at `/workspace`
    #[serde(default)]
    pub workspace_path: Option<String>,
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_image() -> String {
    "python:3.12-slim".to_string()
}

fn default_test_command() -> String {
    "pytest -q".to_string()
}

const fn default_timeout_secs() -> u64 {
    300
}

fn default_memory_limit() -> String {
    "512m".to_string()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            image: default_image(),
            test_command: default_test_command(),
            timeout_secs: default_timeout_secs(),
            memory_limit: default_memory_limit(),
            workspace_path: None,
        }
    }
}

/// Automated evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgeConfig {
    /// API key; falls back to `ANTHROPIC_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_judge_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Character cap on the evaluation packet
    #[serde(default = "default_max_packet_chars")]
    pub max_packet_chars: usize,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_judge_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

const fn default_max_tokens() -> u32 {
    2000
}

const fn default_request_timeout_secs() -> u64 {
    120
}

const fn default_max_packet_chars() -> usize {
    100_000
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_judge_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_request_timeout_secs(),
            max_packet_chars: default_max_packet_chars(),
        }
    }
}

/// QA worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Delay between polls when the queue is empty
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
