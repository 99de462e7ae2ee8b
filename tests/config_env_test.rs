use std::io::Write;
use tempfile::NamedTempFile;

use tracesmith::infrastructure::config::ConfigLoader;
use tracesmith::infrastructure::logging::{LogConfig, LogFormat};

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_env_overrides_nested_sections() {
    let file = config_file("sandbox:\n  image: python:3.11\n  timeout_secs: 60\n");

    let config = temp_env::with_vars(
        [
            ("TRACESMITH_SANDBOX__TIMEOUT_SECS", Some("90")),
            ("TRACESMITH_JUDGE__MODEL", Some("judge-from-env")),
            ("TRACESMITH_WORKER__POLL_INTERVAL_MS", Some("250")),
        ],
        || ConfigLoader::load_from_file(file.path()).unwrap(),
    );

    assert_eq!(config.sandbox.image, "python:3.11");
    assert_eq!(config.sandbox.timeout_secs, 90);
    assert_eq!(config.judge.model, "judge-from-env");
    assert_eq!(config.worker.poll_interval_ms, 250);
}

#[test]
fn test_invalid_env_value_is_rejected() {
    let file = config_file("{}\n");

    let result = temp_env::with_var("TRACESMITH_LOGGING__FORMAT", Some("xml"), || {
        ConfigLoader::load_from_file(file.path())
    });

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Invalid log format: xml"));
}

#[test]
fn test_logging_section_drives_log_config() {
    let file = config_file("logging:\n  level: debug\n  format: json\n  log_dir: /tmp/tracesmith-logs\n");
    let config = temp_env::with_vars_unset(["TRACESMITH_LOGGING__LEVEL", "TRACESMITH_LOGGING__FORMAT"], || {
        ConfigLoader::load_from_file(file.path()).unwrap()
    });

    let log_config = LogConfig::from(&config.logging);
    assert_eq!(log_config.level, "debug");
    assert_eq!(log_config.format, LogFormat::Json);
    assert!(log_config.log_dir.is_some());
}

#[test]
fn test_redaction_rules_from_file() {
    let file = config_file("redaction:\n  rules: [pii_mask]\n  max_blob_bytes: 4096\n");
    let config = temp_env::with_var_unset("TRACESMITH_LOGGING__FORMAT", || {
        ConfigLoader::load_from_file(file.path()).unwrap()
    });

    assert_eq!(config.redaction.rules.len(), 1);
    assert_eq!(config.redaction.rules[0].as_str(), "pii_mask");
    assert_eq!(config.redaction.max_blob_bytes, 4096);
}
