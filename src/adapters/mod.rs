//! Infrastructure adapters for external systems.

pub mod blob_store;
pub mod evaluator;
pub mod mock;
pub mod sandbox;
pub mod sqlite;
