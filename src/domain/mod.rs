//! Domain layer for tracesmith
//!
//! Core data model, validation rules, error taxonomy and the port traits
//! adapters implement.

pub mod errors;
pub mod models;
pub mod ports;
pub mod validation;

pub use errors::{DomainError, DomainResult, ErrorKind};
