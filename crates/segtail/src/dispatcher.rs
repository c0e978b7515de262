// Dispatcher: drains the work queue in order, transfers each segment next to
// the playlist and appends it to the playlist once the transfer succeeded.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SegtailError};
use crate::lister::MediaItem;
use crate::metrics::SessionMetrics;
use crate::playlist::{PlaylistSink, SharedPlaylist};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::source::segment_dir;
use crate::status::{Operation, StatusCallback};
use crate::storage::RemoteDirectory;

pub struct Dispatcher<S> {
    directory: Arc<dyn RemoteDirectory>,
    queue: mpsc::Receiver<MediaItem>,
    playlist: SharedPlaylist<S>,
    playlist_path: PathBuf,
    local_dir: PathBuf,
    retry: RetryPolicy,
    status: Option<Arc<dyn StatusCallback>>,
    session_id: String,
    token: CancellationToken,
    metrics: Arc<SessionMetrics>,
}

impl<S: PlaylistSink + 'static> Dispatcher<S> {
    /// Segments are stored in the directory of `playlist_path`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        directory: Arc<dyn RemoteDirectory>,
        queue: mpsc::Receiver<MediaItem>,
        playlist: SharedPlaylist<S>,
        playlist_path: PathBuf,
        retry: RetryPolicy,
        status: Option<Arc<dyn StatusCallback>>,
        session_id: String,
        token: CancellationToken,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            directory,
            queue,
            local_dir: segment_dir(&playlist_path),
            playlist,
            playlist_path,
            retry,
            status,
            session_id,
            token,
            metrics,
        }
    }

    /// Processes queued items one at a time until cancelled or the queue closes.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let item = tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                item = self.queue.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            match self.handle(&item).await {
                Ok(()) => {}
                Err(SegtailError::Cancelled) => break,
                Err(e) => return Err(e),
            }
        }
        debug!("Dispatcher stopped");
        Ok(())
    }

    /// Transfers one item. A failed transfer is reported and skipped.
    /// Cancellation and internal errors are returned and end the dispatcher.
    pub async fn handle(&self, item: &MediaItem) -> Result<()> {
        if !is_plain_file_name(&item.name) {
            let err = SegtailError::transfer_failed(
                &item.path,
                format!("refusing to store segment named `{}`", item.name),
                false,
            );
            self.report_failure(item, &err);
            return Ok(());
        }

        if self.playlist_path.file_name() == Some(OsStr::new(&item.name)) {
            let err = SegtailError::transfer_failed(
                &item.path,
                "segment would overwrite the playlist",
                false,
            );
            self.report_failure(item, &err);
            return Ok(());
        }

        let local_path = self.local_dir.join(&item.name);
        let started = Instant::now();
        let directory = &self.directory;
        let remote = item.path.as_str();
        let target = local_path.as_path();
        let status = self.status.as_deref();

        let outcome = retry_with_backoff(&self.retry, &self.token, move |_attempt| {
            directory.fetch_segment(remote, target, status)
        })
        .await;

        match outcome {
            Ok(size) => {
                self.append_entry(item.name.clone()).await?;
                self.metrics
                    .record_download(size, started.elapsed().as_millis() as u64);
                debug!(segment = %item.name, size, "Segment stored");
                if let Some(status) = &self.status {
                    status.completed(
                        &self.session_id,
                        &item.path,
                        &item.name,
                        size,
                        Operation::Download,
                    );
                }
                Ok(())
            }
            Err(SegtailError::Cancelled) => Err(SegtailError::Cancelled),
            Err(err @ SegtailError::Internal { .. }) => {
                remove_partial(&local_path).await;
                self.report_failure(item, &err);
                Err(err)
            }
            Err(err) => {
                remove_partial(&local_path).await;
                self.report_failure(item, &err);
                Ok(())
            }
        }
    }

    /// The playlist lock is shared with the blocking flush, so it is taken
    /// off the async worker.
    async fn append_entry(&self, name: String) -> Result<()> {
        let playlist = Arc::clone(&self.playlist);
        tokio::task::spawn_blocking(move || playlist.lock().append(name))
            .await
            .map_err(|e| SegtailError::Internal {
                reason: format!("playlist append task failed: {e}"),
            })
    }

    fn report_failure(&self, item: &MediaItem, err: &SegtailError) {
        self.metrics.record_download_error();
        warn!(segment = %item.name, error = %err, "Skipping segment");
        if let Some(status) = &self.status {
            status.error(&self.session_id, &item.path, Operation::Download, err);
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %e, "Could not remove partial segment");
    }
}
