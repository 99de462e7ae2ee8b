//! Infrastructure layer module
//!
//! Process-level concerns shared by the CLI and the worker: hierarchical
//! configuration loading and the tracing subscriber.

pub mod config;
pub mod logging;
