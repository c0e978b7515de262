use tracing::info;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::lister::SegmentLister;
use crate::playlist::Playlist;
use crate::source::{SourceRequest, resolve};
use crate::storage::StorageClient;

/// Writes a one-shot playlist of every segment currently listed remotely.
///
/// No segment is transferred and no background task is started. Returns the
/// number of entries written.
pub async fn write_playlist_snapshot(
    client: &dyn StorageClient,
    request: &SourceRequest,
    config: &StreamConfig,
) -> Result<usize> {
    config.validate()?;
    let source = resolve(client, request).await?;

    let items = SegmentLister::new(source.directory, source.mode)
        .list()
        .await?;
    let mut playlist = Playlist::new(config.target_duration, source.file);
    for item in &items {
        playlist.append(item.name.clone());
    }
    playlist.flush()?;

    info!(
        playlist = %source.local_path.display(),
        entries = items.len(),
        "Playlist snapshot written"
    );
    Ok(items.len())
}
