//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment: programmatic defaults, the
//! project YAML files under `.tracesmith/`, then `TRACESMITH_*` environment
//! overrides.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, PROJECT_DIR};
