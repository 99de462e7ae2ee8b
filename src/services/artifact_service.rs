//! Redact-then-store path shared by uploads and the QA pipeline.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{BlobId, BlobRef, RedactionConfig, RedactionRule};
use crate::domain::ports::{ArtifactStore, BlobRepository};
use crate::services::redaction::Redactor;

/// Stores artifacts after redaction and records their metadata.
#[derive(Clone)]
pub struct ArtifactService {
    store: Arc<dyn ArtifactStore>,
    blobs: Arc<dyn BlobRepository>,
    redactor: Redactor,
    rules: Vec<RedactionRule>,
}

impl ArtifactService {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        blobs: Arc<dyn BlobRepository>,
        redactor: Redactor,
        rules: Vec<RedactionRule>,
    ) -> Self {
        Self {
            store,
            blobs,
            redactor,
            rules,
        }
    }

    pub fn from_config(store: Arc<dyn ArtifactStore>, blobs: Arc<dyn BlobRepository>, config: &RedactionConfig) -> Self {
        Self::new(store, blobs, Redactor::new(config.max_blob_bytes), config.rules.clone())
    }

    /// Redact `data`, store the result, and record its metadata.
    ///
    /// The blob id addresses the redacted bytes. Storing content that is
    /// already known returns the metadata recorded first.
    #[instrument(skip(self, data), fields(bytes = data.len()), err)]
    pub async fn store(&self, data: &[u8], content_type: &str) -> DomainResult<BlobRef> {
        let outcome = self.redactor.apply(data, Some(&self.rules));
        if outcome.modified {
            debug!(rules = ?outcome.applied_rules, truncated = outcome.truncated, "Redacted artifact");
        }

        let mut blob = self.store.put(&outcome.content, content_type).await?;
        blob.redaction = Some(outcome.report());
        self.blobs.record(&blob).await
    }

    pub async fn fetch(&self, blob_id: &str) -> DomainResult<Vec<u8>> {
        self.store.get(blob_id).await
    }

    pub async fn metadata(&self, blob_id: &BlobId) -> DomainResult<Option<BlobRef>> {
        self.blobs.get(blob_id).await
    }

    /// Lossy text preview of a blob, at most `max_chars` characters plus `...`.
    ///
    /// `None` when the id is empty, malformed, or unknown.
    pub async fn preview(&self, blob_id: &str, max_chars: usize) -> Option<String> {
        if blob_id.is_empty() {
            return None;
        }
        let bytes = self.store.get(blob_id).await.ok()?;
        let text = String::from_utf8_lossy(&bytes);
        if text.chars().count() > max_chars {
            let mut preview: String = text.chars().take(max_chars).collect();
            preview.push_str("...");
            Some(preview)
        } else {
            Some(text.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::blob_store::LocalFsArtifactStore;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteBlobRepository};
    use tempfile::TempDir;

    async fn service(config: &RedactionConfig) -> (TempDir, ArtifactService) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalFsArtifactStore::new(dir.path()));
        let blobs = Arc::new(SqliteBlobRepository::new(create_migrated_test_pool().await.unwrap()));
        (dir, ArtifactService::from_config(store, blobs, config))
    }

    #[tokio::test]
    async fn test_store_redacts_before_addressing() {
        let (_dir, service) = service(&RedactionConfig::default()).await;
        let blob = service.store(b"mail me at dev@example.com", "text/plain").await.unwrap();

        let stored = service.fetch(blob.blob_id.as_str()).await.unwrap();
        assert_eq!(stored, b"mail me at [EMAIL_REDACTED]");
        assert_eq!(blob.blob_id, BlobId::for_content(&stored));
        assert_eq!(blob.byte_length, stored.len() as u64);

        let report = blob.redaction.unwrap();
        assert!(report.applied);
        assert_eq!(report.rules, vec![RedactionRule::PiiMask]);
    }

    #[tokio::test]
    async fn test_clean_content_is_stored_verbatim() {
        let (_dir, service) = service(&RedactionConfig::default()).await;
        let blob = service.store(b"plain text", "text/plain").await.unwrap();

        assert_eq!(service.fetch(blob.blob_id.as_str()).await.unwrap(), b"plain text");
        assert_eq!(blob.redaction, Some(Default::default()));
        assert_eq!(service.metadata(&blob.blob_id).await.unwrap(), Some(blob));
    }

    #[tokio::test]
    async fn test_configured_rules_and_cap_apply() {
        let config = RedactionConfig {
            rules: vec![RedactionRule::TruncateLarge],
            max_blob_bytes: 4,
        };
        let (_dir, service) = service(&config).await;
        let blob = service.store(b"dev@example.com", "text/plain").await.unwrap();

        assert_eq!(service.fetch(blob.blob_id.as_str()).await.unwrap(), b"dev@");
        assert_eq!(blob.redaction.unwrap().rules, vec![RedactionRule::TruncateLarge]);
    }

    #[tokio::test]
    async fn test_preview() {
        let (_dir, service) = service(&RedactionConfig::default()).await;
        let blob = service.store("héllo world".as_bytes(), "text/plain").await.unwrap();

        assert_eq!(service.preview(blob.blob_id.as_str(), 5).await.as_deref(), Some("héllo..."));
        assert_eq!(service.preview(blob.blob_id.as_str(), 50).await.as_deref(), Some("héllo world"));
        assert_eq!(service.preview("", 5).await, None);
        assert_eq!(service.preview("sha256:nope", 5).await, None);
    }
}
