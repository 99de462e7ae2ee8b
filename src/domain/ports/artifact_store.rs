//! Artifact (blob) store port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BlobId, BlobRef};

/// Content-addressed storage for arbitrary byte payloads.
///
/// Storing is idempotent by content: a second `put` of identical bytes
/// returns the same id and does not rewrite the stored copy.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `data` and return its reference.
    async fn put(&self, data: &[u8], content_type: &str) -> DomainResult<BlobRef>;

    /// Read a blob back.
    ///
    /// A malformed id yields `InvalidBlobId`; a well-formed id with no stored
    /// content yields `BlobNotFound`.
    async fn get(&self, blob_id: &str) -> DomainResult<Vec<u8>>;

    /// Whether content for `blob_id` is stored.
    async fn exists(&self, blob_id: &BlobId) -> DomainResult<bool>;

    /// Storage URI for `blob_id`.
    fn uri(&self, blob_id: &BlobId) -> String;
}
