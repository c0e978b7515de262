// Source resolution: turns a play request into a remote directory handle plus
// the listing mode the session will use for its whole lifetime.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, SegtailError};
use crate::storage::{RemoteDirectory, ShareToken, StorageClient};

/// What the caller asked to play.
#[derive(Debug, Clone, Default)]
pub struct SourceRequest {
    /// Playlist file to create. Segments land next to it.
    pub local_path: PathBuf,
    /// Remote directory, addressed inside `allocation_id`.
    pub remote_path: String,
    /// Allocation holding `remote_path`.
    pub allocation_id: String,
    /// Share token granting access to a remote directory.
    pub share_token: String,
    /// Directory to list under `share_token`; derived from the token when empty.
    pub lookup_key: String,
}

impl SourceRequest {
    pub fn remote(
        allocation_id: impl Into<String>,
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            allocation_id: allocation_id.into(),
            ..Default::default()
        }
    }

    pub fn shared(share_token: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
            share_token: share_token.into(),
            ..Default::default()
        }
    }

    pub fn with_lookup_key(mut self, lookup_key: impl Into<String>) -> Self {
        self.lookup_key = lookup_key.into();
        self
    }

    /// Checks the required arguments. Performs no I/O.
    pub fn validate(&self) -> Result<()> {
        if self.local_path.as_os_str().is_empty() {
            return Err(SegtailError::missing_argument("local_path"));
        }
        if self.remote_path.is_empty() && self.share_token.is_empty() {
            return Err(SegtailError::missing_argument("remote_path or share_token"));
        }
        if !self.remote_path.is_empty() && self.allocation_id.is_empty() {
            return Err(SegtailError::missing_argument("allocation_id"));
        }
        Ok(())
    }
}

/// How the segment lister reaches the remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListMode {
    Direct { path: String },
    TokenScoped { token: String, lookup_key: String },
}

pub struct ResolvedSource {
    pub directory: Arc<dyn RemoteDirectory>,
    pub mode: ListMode,
    pub local_path: PathBuf,
    /// Directory that receives transferred segments.
    pub local_dir: PathBuf,
    /// The freshly truncated playlist file.
    pub file: File,
}

impl std::fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("allocation", &self.directory.id())
            .field("mode", &self.mode)
            .field("local_path", &self.local_path)
            .finish()
    }
}

/// Validates `request`, creates the local playlist file, then resolves the remote source.
pub async fn resolve(client: &dyn StorageClient, request: &SourceRequest) -> Result<ResolvedSource> {
    request.validate()?;

    let file = tokio::fs::File::create(&request.local_path)
        .await?
        .into_std()
        .await;
    let local_dir = segment_dir(&request.local_path);
    debug!(path = %request.local_path.display(), "Playlist file created");

    if !request.remote_path.is_empty() {
        let directory = client
            .allocation(&request.allocation_id)
            .await
            .map_err(|e| into_resolution_error("error fetching the allocation", e))?;
        info!(
            allocation = %request.allocation_id,
            path = %request.remote_path,
            "Resolved source by allocation"
        );
        return Ok(ResolvedSource {
            directory,
            mode: ListMode::Direct {
                path: request.remote_path.clone(),
            },
            local_path: request.local_path.clone(),
            local_dir,
            file,
        });
    }

    let token = ShareToken::decode(&request.share_token)?;
    let directory = client
        .allocation_from_token(&token)
        .await
        .map_err(|e| into_resolution_error("error fetching the allocation from share token", e))?;

    if !token.is_directory() {
        return Err(SegtailError::not_a_directory(token.file_name()));
    }
    let lookup_key = if request.lookup_key.is_empty() {
        token.lookup_key()?
    } else {
        request.lookup_key.clone()
    };
    info!(
        allocation = %token.allocation_id,
        lookup_key = %lookup_key,
        "Resolved source by share token"
    );

    Ok(ResolvedSource {
        directory,
        mode: ListMode::TokenScoped {
            token: request.share_token.clone(),
            lookup_key,
        },
        local_path: request.local_path.clone(),
        local_dir,
        file,
    })
}

fn into_resolution_error(context: &str, err: SegtailError) -> SegtailError {
    match err {
        SegtailError::ResolutionFailed { reason } => {
            SegtailError::resolution_failed(format!("{context}: {reason}"))
        }
        other => SegtailError::resolution_failed(format!("{context}: {other}")),
    }
}

/// Directory next to `local_path` where segments are stored.
pub fn segment_dir(local_path: &Path) -> PathBuf {
    match local_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStorage;

    #[tokio::test]
    async fn empty_local_path_fails_without_side_effects() {
        let storage = MockStorage::new();
        let request = SourceRequest::remote("alloc-1", "/a", "");

        let err = resolve(&storage, &request).await.unwrap_err();
        assert!(matches!(
            err,
            SegtailError::MissingArgument {
                argument: "local_path"
            }
        ));
        assert_eq!(storage.remote_calls(), 0);
    }

    #[tokio::test]
    async fn missing_remote_and_token_fails_before_creating_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("live.m3u8");
        let storage = MockStorage::new();
        let request = SourceRequest {
            local_path: local.clone(),
            ..Default::default()
        };

        assert!(matches!(
            resolve(&storage, &request).await,
            Err(SegtailError::MissingArgument { .. })
        ));
        assert!(!local.exists());
        assert_eq!(storage.remote_calls(), 0);
    }

    #[tokio::test]
    async fn remote_path_without_allocation_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let request = SourceRequest::remote("", "/live", dir.path().join("live.m3u8"));
        assert!(matches!(
            resolve(&MockStorage::new(), &request).await,
            Err(SegtailError::MissingArgument {
                argument: "allocation_id"
            })
        ));
    }

    #[tokio::test]
    async fn remote_path_resolves_directly_and_truncates_target() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("live.m3u8");
        std::fs::write(&local, "stale").unwrap();
        let storage = MockStorage::new();

        let source = resolve(&storage, &SourceRequest::remote("alloc-1", "/live", &local))
            .await
            .unwrap();

        assert_eq!(
            source.mode,
            ListMode::Direct {
                path: "/live".to_string()
            }
        );
        assert_eq!(source.local_dir, dir.path());
        assert_eq!(std::fs::read(&local).unwrap(), b"");
    }

    #[tokio::test]
    async fn unknown_allocation_is_a_resolution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MockStorage::new().without_allocation();
        let request = SourceRequest::remote("ghost", "/live", dir.path().join("live.m3u8"));

        assert!(matches!(
            resolve(&storage, &request).await,
            Err(SegtailError::ResolutionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn file_token_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let token = ShareToken::for_file("alloc-1", "/live/seg1.ts").encode().unwrap();
        let request = SourceRequest::shared(token, dir.path().join("live.m3u8"));

        let err = resolve(&MockStorage::new(), &request).await.unwrap_err();
        assert!(matches!(err, SegtailError::NotADirectory { .. }));
    }

    #[tokio::test]
    async fn directory_token_derives_lookup_key() {
        let dir = tempfile::tempdir().unwrap();
        let ticket = ShareToken::for_directory("alloc-1", "/live");
        let raw = ticket.encode().unwrap();
        let request = SourceRequest::shared(raw.clone(), dir.path().join("live.m3u8"));

        let source = resolve(&MockStorage::new(), &request).await.unwrap();
        assert_eq!(
            source.mode,
            ListMode::TokenScoped {
                token: raw,
                lookup_key: ticket.lookup_key().unwrap(),
            }
        );
    }

    #[tokio::test]
    async fn explicit_lookup_key_wins() {
        let dir = tempfile::tempdir().unwrap();
        let raw = ShareToken::for_directory("alloc-1", "/live").encode().unwrap();
        let request =
            SourceRequest::shared(raw, dir.path().join("live.m3u8")).with_lookup_key("abc123");

        let source = resolve(&MockStorage::new(), &request).await.unwrap();
        assert!(matches!(
            source.mode,
            ListMode::TokenScoped { ref lookup_key, .. } if lookup_key == "abc123"
        ));
    }

    #[test]
    fn segment_dir_defaults_to_current_directory() {
        assert_eq!(segment_dir(Path::new("live.m3u8")), PathBuf::from("."));
        assert_eq!(
            segment_dir(Path::new("/tmp/out/live.m3u8")),
            PathBuf::from("/tmp/out")
        );
    }
}
