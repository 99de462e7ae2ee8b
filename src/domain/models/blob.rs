//! Content-addressed blob model.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix shared by every blob identifier.
pub const BLOB_ID_PREFIX: &str = "sha256:";

/// Content type assumed when an upload does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A blob identifier of the form `sha256:<64 lowercase hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobId(String);

impl BlobId {
    /// Derive the identifier of `data`.
    pub fn for_content(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(format!("{BLOB_ID_PREFIX}{}", hex::encode(digest)))
    }

    /// Parse an identifier, rejecting anything that is not `sha256:` plus 64 lowercase hex digits.
    pub fn parse(s: &str) -> Result<Self, String> {
        let Some(hex_part) = s.strip_prefix(BLOB_ID_PREFIX) else {
            return Err(format!("Invalid blob_id format: {s}"));
        };
        let well_formed = hex_part.len() == 64
            && hex_part
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(format!("Invalid blob_id format: {s}"));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The hex digest without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.0[BLOB_ID_PREFIX.len()..]
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BlobId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BlobId> for String {
    fn from(id: BlobId) -> Self {
        id.0
    }
}

/// Redaction rules, in the fixed order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionRule {
    SecretScan,
    PiiMask,
    TruncateLarge,
}

impl RedactionRule {
    pub const ALL: [RedactionRule; 3] = [Self::SecretScan, Self::PiiMask, Self::TruncateLarge];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecretScan => "secret_scan",
            Self::PiiMask => "pii_mask",
            Self::TruncateLarge => "truncate_large",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "secret_scan" => Some(Self::SecretScan),
            "pii_mask" => Some(Self::PiiMask),
            "truncate_large" => Some(Self::TruncateLarge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRedaction {
    pub applied: bool,
    #[serde(default)]
    pub rules: Vec<RedactionRule>,
}

/// Metadata describing a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub blob_id: BlobId,
    pub content_type: String,
    pub byte_length: u64,
    pub storage_uri: String,
    #[serde(default)]
    pub redaction: Option<BlobRedaction>,
}
