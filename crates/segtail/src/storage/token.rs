// Share tokens: base64-encoded JSON tickets granting scoped read access.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, SegtailError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceType {
    #[serde(rename = "d")]
    Directory,
    #[serde(rename = "f")]
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareToken {
    pub allocation_id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_path_hash: String,
    pub reference_type: ReferenceType,
    /// Unix seconds; zero means the ticket never expires.
    #[serde(default)]
    pub expiration: i64,
}

impl ShareToken {
    /// Issues a directory ticket for `path` inside `allocation_id`.
    pub fn for_directory(allocation_id: impl Into<String>, path: impl Into<String>) -> Self {
        let allocation_id = allocation_id.into();
        let file_path = path.into();
        let file_name = file_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            file_path_hash: lookup_key_for(&allocation_id, &file_path),
            allocation_id,
            owner_id: String::new(),
            file_name,
            file_path,
            reference_type: ReferenceType::Directory,
            expiration: 0,
        }
    }

    /// Issues a ticket for a single file.
    pub fn for_file(allocation_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            reference_type: ReferenceType::File,
            ..Self::for_directory(allocation_id, path)
        }
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|e| SegtailError::resolution_failed(format!("share token is not base64: {e}")))?;
        let token: ShareToken = serde_json::from_slice(&bytes).map_err(|e| {
            SegtailError::resolution_failed(format!("share token is not a valid ticket: {e}"))
        })?;
        if token.allocation_id.is_empty() {
            return Err(SegtailError::resolution_failed(
                "share token carries no allocation id",
            ));
        }
        Ok(token)
    }

    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(|e| SegtailError::Internal {
            reason: format!("failed to serialize share token: {e}"),
        })?;
        Ok(STANDARD.encode(json))
    }

    pub fn is_directory(&self) -> bool {
        self.reference_type == ReferenceType::Directory
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Lookup key of the directory this ticket addresses.
    pub fn lookup_key(&self) -> Result<String> {
        if !self.file_path_hash.is_empty() {
            return Ok(self.file_path_hash.clone());
        }
        if !self.file_path.is_empty() {
            return Ok(lookup_key_for(&self.allocation_id, &self.file_path));
        }
        Err(SegtailError::resolution_failed(
            "share token carries neither a path hash nor a path",
        ))
    }

    pub fn is_expired_at(&self, unix_seconds: i64) -> bool {
        self.expiration > 0 && self.expiration <= unix_seconds
    }

    pub fn ensure_valid(&self) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        if self.is_expired_at(now) {
            return Err(SegtailError::resolution_failed(format!(
                "share token expired at {}",
                self.expiration
            )));
        }
        Ok(())
    }
}

/// Lookup key of `path` inside `allocation_id`: hex SHA-256 of `<allocation>:<path>`.
pub fn lookup_key_for(allocation_id: &str, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(allocation_id.as_bytes());
    hasher.update(b":");
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}
