//! SQLite implementation of the BlobRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::parse_optional_json;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BlobId, BlobRef};
use crate::domain::ports::BlobRepository;

#[derive(Clone)]
pub struct SqliteBlobRepository {
    pool: SqlitePool,
}

impl SqliteBlobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlobRepository for SqliteBlobRepository {
    async fn record(&self, blob: &BlobRef) -> DomainResult<BlobRef> {
        let redaction_json = blob.redaction.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO blobs (blob_id, content_type, byte_length, storage_uri, redaction_json, created_at_ms)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(blob_id) DO NOTHING",
        )
        .bind(blob.blob_id.as_str())
        .bind(&blob.content_type)
        .bind(blob.byte_length as i64)
        .bind(&blob.storage_uri)
        .bind(redaction_json)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        self.get(&blob.blob_id)
            .await?
            .ok_or_else(|| DomainError::BlobNotFound(blob.blob_id.to_string()))
    }

    async fn get(&self, blob_id: &BlobId) -> DomainResult<Option<BlobRef>> {
        let row: Option<BlobRow> = sqlx::query_as(
            "SELECT blob_id, content_type, byte_length, storage_uri, redaction_json FROM blobs WHERE blob_id = ?",
        )
        .bind(blob_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(BlobRef::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct BlobRow {
    blob_id: String,
    content_type: String,
    byte_length: i64,
    storage_uri: String,
    redaction_json: Option<String>,
}

impl TryFrom<BlobRow> for BlobRef {
    type Error = DomainError;

    fn try_from(row: BlobRow) -> Result<Self, Self::Error> {
        Ok(BlobRef {
            blob_id: BlobId::parse(&row.blob_id).map_err(DomainError::SerializationError)?,
            content_type: row.content_type,
            byte_length: u64::try_from(row.byte_length).unwrap_or(0),
            storage_uri: row.storage_uri,
            redaction: parse_optional_json(row.redaction_json)?,
        })
    }
}
