//! Blob metadata repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BlobId, BlobRef};

#[async_trait]
pub trait BlobRepository: Send + Sync {
    /// Record metadata for a stored blob.
    ///
    /// When the blob is already known the first recorded metadata is kept and returned.
    async fn record(&self, blob: &BlobRef) -> DomainResult<BlobRef>;

    /// Get metadata by blob id.
    async fn get(&self, blob_id: &BlobId) -> DomainResult<Option<BlobRef>>;
}
