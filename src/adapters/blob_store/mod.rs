//! Blob store adapters.

pub mod local_fs;

pub use local_fs::LocalFsArtifactStore;
