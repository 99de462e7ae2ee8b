use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::Config;

/// Directory holding project-local state and configuration.
pub const PROJECT_DIR: &str = ".tracesmith";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Blob store root cannot be empty")]
    EmptyBlobRoot,

    #[error("Invalid max_blob_bytes: {0}. Must be at least 1")]
    InvalidMaxBlobBytes(usize),

    #[error("Invalid sandbox timeout_secs: {0}. Must be at least 1")]
    InvalidSandboxTimeout(u64),

    #[error("Sandbox {0} cannot be empty")]
    EmptySandboxField(&'static str),

    #[error("Judge model cannot be empty")]
    EmptyJudgeModel,

    #[error("Invalid judge max_tokens: {0}. Must be at least 1")]
    InvalidMaxTokens(u32),

    #[error("Invalid worker poll_interval_ms: {0}. Must be at least 1")]
    InvalidPollInterval(u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .tracesmith/config.yaml (project config, created by init)
    /// 3. .tracesmith/local.yaml (project local overrides, optional)
    /// 4. Environment variables (TRACESMITH_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("TRACESMITH_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        let dir = Path::new(PROJECT_DIR);
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("TRACESMITH_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let logging = &config.logging;
        if !["trace", "debug", "info", "warn", "error"].contains(&logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(logging.level.clone()));
        }
        if !["json", "pretty"].contains(&logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(logging.format.clone()));
        }
        if !["daily", "hourly", "never"].contains(&logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(logging.rotation.clone()));
        }

        if config.blob_store.root.trim().is_empty() {
            return Err(ConfigError::EmptyBlobRoot);
        }
        if config.redaction.max_blob_bytes == 0 {
            return Err(ConfigError::InvalidMaxBlobBytes(0));
        }

        let sandbox = &config.sandbox;
        if sandbox.timeout_secs == 0 {
            return Err(ConfigError::InvalidSandboxTimeout(0));
        }
        for (name, value) in [
            ("image", &sandbox.image),
            ("test_command", &sandbox.test_command),
            ("memory_limit", &sandbox.memory_limit),
            ("docker_binary", &sandbox.docker_binary),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptySandboxField(name));
            }
        }

        if config.judge.model.trim().is_empty() {
            return Err(ConfigError::EmptyJudgeModel);
        }
        if config.judge.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(0));
        }

        if config.worker.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(0));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".tracesmith/tracesmith.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.sandbox.timeout_secs, 300);
        assert_eq!(config.judge.max_packet_chars, 100_000);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 3
logging:
  level: debug
  format: json
sandbox:
  image: node:20
  test_command: npm test
judge:
  model: custom-model
redaction:
  rules: [secret_scan]
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 3);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.sandbox.image, "node:20");
        assert_eq!(config.sandbox.memory_limit, "512m");
        assert_eq!(config.judge.model, "custom-model");
        assert_eq!(config.redaction.rules.len(), 1);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "loud"),
            other => panic!("Expected InvalidLogLevel, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDatabasePath)
        ));
    }

    #[test]
    fn test_validate_zero_max_connections() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConnections(0))
        ));
    }

    #[test]
    fn test_validate_sandbox_fields() {
        let mut config = Config::default();
        config.sandbox.timeout_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSandboxTimeout(0))
        ));

        let mut config = Config::default();
        config.sandbox.test_command = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptySandboxField("test_command"))
        ));
    }

    #[test]
    fn test_validate_judge_and_worker() {
        let mut config = Config::default();
        config.judge.max_tokens = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxTokens(0))
        ));

        let mut config = Config::default();
        config.worker.poll_interval_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPollInterval(0))
        ));
    }

    #[test]
    fn test_validate_redaction_cap() {
        let mut config = Config::default();
        config.redaction.max_blob_bytes = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxBlobBytes(0))
        ));
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: warn\n  format: json\nworker:\n  poll_interval_ms: 50").unwrap();
        file.flush().unwrap();

        let config = temp_env::with_var("TRACESMITH_LOGGING__LEVEL", Some("debug"), || {
            ConfigLoader::load_from_file(file.path()).unwrap()
        });

        assert_eq!(config.logging.level, "debug", "Env should win over the file");
        assert_eq!(config.logging.format, "json", "File value should persist");
        assert_eq!(config.worker.poll_interval_ms, 50);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sandbox:\n  timeout_secs: 0").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "judge:\n  model: base-model\nlogging:\n  level: info\n  format: json").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "judge:\n  model: local-model\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.judge.model, "local-model", "Override should win");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json", "Base value should persist");
    }
}
