//! Content-addressed local filesystem blob store.
//!
//! Layout: `{root}/sha256/{first two hex chars}/{full hex digest}`.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BlobId, BlobRef};
use crate::domain::ports::ArtifactStore;

#[derive(Debug, Clone)]
pub struct LocalFsArtifactStore {
    root: PathBuf,
}

impl LocalFsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, blob_id: &BlobId) -> PathBuf {
        let hex = blob_id.hex();
        self.root.join("sha256").join(&hex[..2]).join(hex)
    }

    fn parse_id(blob_id: &str) -> DomainResult<BlobId> {
        BlobId::parse(blob_id).map_err(|_| DomainError::InvalidBlobId(blob_id.to_string()))
    }

    /// Write `data` to a temporary sibling, then rename it into place.
    async fn write_atomically(path: &Path, data: &[u8]) -> DomainResult<()> {
        let Some(parent) = path.parent() else {
            return Err(DomainError::StorageError(format!(
                "Blob path has no parent: {}",
                path.display()
            )));
        };
        fs::create_dir_all(parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp_path, data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for LocalFsArtifactStore {
    async fn put(&self, data: &[u8], content_type: &str) -> DomainResult<BlobRef> {
        let blob_id = BlobId::for_content(data);
        let path = self.blob_path(&blob_id);

        if fs::try_exists(&path).await? {
            debug!(blob_id = %blob_id, "Blob already stored, skipping write");
        } else {
            Self::write_atomically(&path, data).await?;
            debug!(blob_id = %blob_id, bytes = data.len(), "Stored blob");
        }

        Ok(BlobRef {
            storage_uri: self.uri(&blob_id),
            blob_id,
            content_type: content_type.to_string(),
            byte_length: data.len() as u64,
            redaction: None,
        })
    }

    async fn get(&self, blob_id: &str) -> DomainResult<Vec<u8>> {
        let id = Self::parse_id(blob_id)?;
        match fs::read(self.blob_path(&id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DomainError::BlobNotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, blob_id: &BlobId) -> DomainResult<bool> {
        Ok(fs::try_exists(self.blob_path(blob_id)).await?)
    }

    fn uri(&self, blob_id: &BlobId) -> String {
        format!("file://{}", self.blob_path(blob_id).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalFsArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalFsArtifactStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_dir, store) = store();
        let blob = store.put(b"hello world", "text/plain").await.unwrap();

        assert!(blob.blob_id.as_str().starts_with("sha256:"));
        assert_eq!(blob.byte_length, 11);
        assert_eq!(blob.content_type, "text/plain");
        assert_eq!(store.get(blob.blob_id.as_str()).await.unwrap(), b"hello world");
        assert!(store.exists(&blob.blob_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_layout_and_uri() {
        let (dir, store) = store();
        let blob = store.put(b"layout", "text/plain").await.unwrap();
        let hex = blob.blob_id.hex();
        let expected = dir.path().join("sha256").join(&hex[..2]).join(hex);

        assert!(expected.is_file());
        assert_eq!(blob.storage_uri, format!("file://{}", expected.display()));
        assert_eq!(store.uri(&blob.blob_id), blob.storage_uri);
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let (dir, store) = store();
        let first = store.put(b"same", "text/plain").await.unwrap();
        let second = store.put(b"same", "application/octet-stream").await.unwrap();
        let other = store.put(b"different", "text/plain").await.unwrap();

        assert_eq!(first.blob_id, second.blob_id);
        assert_ne!(first.blob_id, other.blob_id);

        let shard = dir.path().join("sha256").join(&first.blob_id.hex()[..2]);
        let leftovers: Vec<_> = std::fs::read_dir(shard)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_ids() {
        let (_dir, store) = store();
        let missing = format!("sha256:{}", "0".repeat(64));

        assert!(matches!(store.get(&missing).await, Err(DomainError::BlobNotFound(_))));
        assert!(matches!(store.get("md5:abc").await, Err(DomainError::InvalidBlobId(_))));
        assert!(matches!(store.get("sha256:xyz").await, Err(DomainError::InvalidBlobId(_))));
    }
}
