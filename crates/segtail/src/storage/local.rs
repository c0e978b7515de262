// Filesystem-backed storage: each allocation is a directory under a root.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

use super::{ListEntry, RemoteDirectory, ShareToken, StorageClient, join_remote, lookup_key_for};
use crate::error::{Result, SegtailError};
use crate::status::{Operation, StatusCallback};

const COPY_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn open(&self, allocation_id: &str) -> Result<LocalAllocation> {
        let valid = !allocation_id.is_empty()
            && Path::new(allocation_id)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            && !allocation_id.contains(['/', '\\']);
        if !valid {
            return Err(SegtailError::resolution_failed(format!(
                "invalid allocation id `{allocation_id}`"
            )));
        }

        let dir = self.root.join(allocation_id);
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(LocalAllocation {
                id: allocation_id.to_string(),
                dir,
            }),
            Ok(_) => Err(SegtailError::resolution_failed(format!(
                "allocation `{allocation_id}` is not a directory"
            ))),
            Err(e) => Err(SegtailError::resolution_failed(format!(
                "allocation `{allocation_id}` not found: {e}"
            ))),
        }
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn allocation(&self, allocation_id: &str) -> Result<Arc<dyn RemoteDirectory>> {
        Ok(Arc::new(self.open(allocation_id).await?))
    }

    async fn allocation_from_token(&self, token: &ShareToken) -> Result<Arc<dyn RemoteDirectory>> {
        token.ensure_valid()?;
        Ok(Arc::new(self.open(&token.allocation_id).await?))
    }
}

#[derive(Debug, Clone)]
pub struct LocalAllocation {
    id: String,
    dir: PathBuf,
}

impl LocalAllocation {
    /// Maps a remote path onto the allocation directory, refusing to leave it.
    fn resolve(&self, remote_path: &str) -> std::io::Result<PathBuf> {
        let mut resolved = self.dir.clone();
        for part in remote_path.split('/').filter(|p| !p.is_empty() && *p != ".") {
            if part == ".." {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("path `{remote_path}` escapes the allocation"),
                ));
            }
            resolved.push(part);
        }
        Ok(resolved)
    }

    async fn read_entries(&self, remote_path: &str) -> std::io::Result<Vec<ListEntry>> {
        let dir = self.resolve(remote_path)?;
        let mut reader = tokio::fs::read_dir(&dir).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_directory = entry.file_type().await?.is_dir();
            let path = join_remote(remote_path, &name);
            entries.push(ListEntry {
                name,
                path,
                is_directory,
            });
        }
        trace!(allocation = %self.id, path = remote_path, count = entries.len(), "Read directory");
        Ok(entries)
    }

    /// Breadth-first search below `start` for the directory whose lookup key matches.
    async fn find_directory(&self, start: &str, lookup_key: &str) -> std::io::Result<Option<String>> {
        let mut queue = VecDeque::from([start.to_string()]);
        while let Some(path) = queue.pop_front() {
            if lookup_key_for(&self.id, &path) == lookup_key {
                return Ok(Some(path));
            }
            for entry in self.read_entries(&path).await? {
                if entry.is_directory {
                    queue.push_back(entry.path);
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl RemoteDirectory for LocalAllocation {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_children(&self, path: &str) -> Result<Vec<ListEntry>> {
        self.read_entries(path)
            .await
            .map_err(|e| SegtailError::listing_failed(path, e.to_string()))
    }

    async fn list_children_via_token(
        &self,
        token: &str,
        lookup_key: &str,
    ) -> Result<Vec<ListEntry>> {
        let ticket = ShareToken::decode(token)
            .map_err(|e| SegtailError::listing_failed(lookup_key, e.to_string()))?;
        if ticket.allocation_id != self.id {
            return Err(SegtailError::listing_failed(
                lookup_key,
                format!("share token belongs to allocation `{}`", ticket.allocation_id),
            ));
        }

        let start = if ticket.file_path.is_empty() {
            "/"
        } else {
            ticket.file_path.as_str()
        };
        let path = self
            .find_directory(start, lookup_key)
            .await
            .map_err(|e| SegtailError::listing_failed(lookup_key, e.to_string()))?
            .ok_or_else(|| {
                SegtailError::listing_failed(lookup_key, "no directory matches the lookup key")
            })?;
        self.list_children(&path).await
    }

    async fn fetch_segment(
        &self,
        remote_path: &str,
        local_path: &Path,
        status: Option<&dyn StatusCallback>,
    ) -> Result<u64> {
        let transfer_err = |e: std::io::Error| {
            let retryable = !matches!(
                e.kind(),
                ErrorKind::NotFound | ErrorKind::InvalidInput | ErrorKind::PermissionDenied
            );
            SegtailError::transfer_failed(remote_path, e.to_string(), retryable)
        };

        let source_path = self.resolve(remote_path).map_err(transfer_err)?;
        let mut source = tokio::fs::File::open(&source_path)
            .await
            .map_err(transfer_err)?;

        if let Some(parent) = local_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut target = tokio::fs::File::create(local_path).await?;

        let mut buf = vec![0u8; COPY_CHUNK_SIZE];
        let mut copied = 0u64;
        loop {
            let n = source.read(&mut buf).await.map_err(transfer_err)?;
            if n == 0 {
                break;
            }
            target.write_all(&buf[..n]).await?;
            copied += n as u64;
            if let Some(status) = status {
                status.in_progress(&self.id, remote_path, Operation::Download, copied);
            }
        }
        target.flush().await?;
        target.sync_all().await?;

        debug!(
            allocation = %self.id,
            remote = remote_path,
            local = %local_path.display(),
            bytes = copied,
            "Segment fetched"
        );
        Ok(copied)
    }
}
