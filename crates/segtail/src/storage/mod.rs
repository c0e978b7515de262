// Storage collaborator: the narrow surface of the remote storage service the
// engine consumes. Everything else the service offers stays outside.

mod local;
mod token;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::status::StatusCallback;

pub use local::{LocalAllocation, LocalStorage};
pub use token::{ReferenceType, ShareToken, lookup_key_for};

/// One child of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub is_directory: bool,
}

impl ListEntry {
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: true,
        }
    }
}

/// Handle to a provisioned storage area (an allocation).
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Identifier of the allocation behind this handle.
    fn id(&self) -> &str;

    async fn list_children(&self, path: &str) -> Result<Vec<ListEntry>>;

    /// Lists the directory addressed by `lookup_key` under the scope of a share token.
    async fn list_children_via_token(&self, token: &str, lookup_key: &str)
    -> Result<Vec<ListEntry>>;

    /// Copies `remote_path` into `local_path`, returning the number of bytes written.
    async fn fetch_segment(
        &self,
        remote_path: &str,
        local_path: &Path,
        status: Option<&dyn StatusCallback>,
    ) -> Result<u64>;
}

/// Entry point into the storage service.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn allocation(&self, allocation_id: &str) -> Result<Arc<dyn RemoteDirectory>>;

    async fn allocation_from_token(&self, token: &ShareToken) -> Result<Arc<dyn RemoteDirectory>>;
}

/// Joins a remote directory path and a child name with a single `/`.
pub fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}
