use std::sync::Arc;

use tracing::trace;

use crate::error::{Result, SegtailError};
use crate::ordering::sort_listing;
use crate::source::ListMode;
use crate::storage::RemoteDirectory;

/// One discovered remote segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaItem {
    pub name: String,
    pub path: String,
}

impl MediaItem {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Reads the remote directory and returns its segments in playback order.
#[derive(Clone)]
pub struct SegmentLister {
    directory: Arc<dyn RemoteDirectory>,
    mode: ListMode,
}

impl SegmentLister {
    pub fn new(directory: Arc<dyn RemoteDirectory>, mode: ListMode) -> Self {
        Self { directory, mode }
    }

    pub fn mode(&self) -> &ListMode {
        &self.mode
    }

    /// Lists the non-directory children, ordered by segment name.
    ///
    /// Any collaborator failure other than cancellation is reported as
    /// [`SegtailError::RemoteListingFailed`].
    pub async fn list(&self) -> Result<Vec<MediaItem>> {
        let (listed, target) = match &self.mode {
            ListMode::Direct { path } => (self.directory.list_children(path).await, path),
            ListMode::TokenScoped { token, lookup_key } => (
                self.directory
                    .list_children_via_token(token, lookup_key)
                    .await,
                lookup_key,
            ),
        };
        let mut entries = listed.map_err(|e| match e {
            SegtailError::Cancelled | SegtailError::RemoteListingFailed { .. } => e,
            other => SegtailError::listing_failed(target.as_str(), other.to_string()),
        })?;
        entries.retain(|e| !e.is_directory);
        sort_listing(&mut entries);
        trace!(count = entries.len(), "Listed remote segments");

        Ok(entries
            .into_iter()
            .map(|e| MediaItem {
                name: e.name,
                path: e.path,
            })
            .collect())
    }
}
