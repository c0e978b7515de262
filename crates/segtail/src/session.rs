//! Streaming session lifecycle.
//!
//! A [`StreamSession`] owns everything one play request needs: the resolved
//! remote directory, the known-item sequence, the work queue and the playlist
//! file. [`StreamSession::start`] runs three background tasks until one of them
//! signals completion or the session is cancelled through a [`SessionHandle`]:
//!
//! - the poll loop lists the remote directory and enqueues new segments,
//! - the dispatcher transfers queued segments and appends them to the playlist,
//! - the publisher flushes the playlist to disk on a fixed interval.
//!
//! ```text
//!   Created ──start()──▶ Running ──error or cancel──▶ Terminated
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::StreamConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, SegtailError};
use crate::lister::{MediaItem, SegmentLister};
use crate::metrics::SessionMetrics;
use crate::playlist::{Playlist, PlaylistPublisher, SharedPlaylist};
use crate::poller::{KnownItems, PollLoop};
use crate::source::{ListMode, SourceRequest, resolve};
use crate::status::{Operation, StatusCallback};
use crate::storage::{RemoteDirectory, StorageClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Terminated,
}

/// Cancels a running session from another task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    token: CancellationToken,
}

impl SessionHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct StreamSession {
    session_id: String,
    state: SessionState,
    config: StreamConfig,
    directory: Arc<dyn RemoteDirectory>,
    mode: ListMode,
    local_path: PathBuf,
    playlist: SharedPlaylist<File>,
    known: KnownItems,
    status: Option<Arc<dyn StatusCallback>>,
    metrics: Arc<SessionMetrics>,
    token: CancellationToken,
}

impl StreamSession {
    /// Validates the request and configuration, creates the playlist file and
    /// resolves the remote source. Nothing runs until [`start`](Self::start).
    pub async fn create(
        client: &dyn StorageClient,
        request: &SourceRequest,
        config: StreamConfig,
    ) -> Result<Self> {
        config.validate()?;
        let source = resolve(client, request).await?;

        let session_id = config
            .session_id
            .clone()
            .unwrap_or_else(|| source.directory.id().to_string());
        let playlist = Playlist::new(config.target_duration, source.file).into_shared();
        debug!(session = %session_id, "Session created");

        Ok(Self {
            session_id,
            state: SessionState::Created,
            config,
            directory: source.directory,
            mode: source.mode,
            local_path: source.local_path,
            playlist,
            known: KnownItems::default(),
            status: None,
            metrics: Arc::new(SessionMetrics::new()),
            token: CancellationToken::new(),
        })
    }

    pub fn with_status(mut self, status: Arc<dyn StatusCallback>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            token: self.token.clone(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn known_items(&self) -> KnownItems {
        Arc::clone(&self.known)
    }

    pub fn metrics(&self) -> Arc<SessionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn playlist(&self) -> SharedPlaylist<File> {
        Arc::clone(&self.playlist)
    }

    /// Runs the session until a background task fails or the session is
    /// cancelled. Cancellation returns `Ok(())`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Created {
            return Err(SegtailError::Internal {
                reason: format!("session {} was already started", self.session_id),
            });
        }
        self.state = SessionState::Running;

        let path = self.local_path.display().to_string();
        info!(session = %self.session_id, playlist = %path, "Session started");
        if let Some(status) = &self.status {
            status.started(&self.session_id, &path, Operation::Stream, 0);
        }

        let (done_tx, mut done_rx) = mpsc::channel::<Option<SegtailError>>(1);
        let (queue_tx, queue_rx) = mpsc::channel::<MediaItem>(self.config.queue_capacity);

        let poll = PollLoop::new(
            SegmentLister::new(Arc::clone(&self.directory), self.mode.clone()),
            Arc::clone(&self.known),
            queue_tx,
            self.config.poll_interval,
            self.token.clone(),
            Arc::clone(&self.metrics),
        );
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.directory),
            queue_rx,
            Arc::clone(&self.playlist),
            self.local_path.clone(),
            self.config.retry.clone(),
            self.status.clone(),
            self.session_id.clone(),
            self.token.clone(),
            Arc::clone(&self.metrics),
        );
        let publisher = PlaylistPublisher::new(
            Arc::clone(&self.playlist),
            self.config.publish_interval(),
            self.token.clone(),
            Arc::clone(&self.metrics),
        );

        let tasks: Vec<JoinHandle<Result<()>>> = vec![
            spawn_signalling(
                poll.run(),
                done_tx.clone(),
                info_span!("poll", session = %self.session_id),
            ),
            spawn_signalling(
                dispatcher.run(),
                done_tx.clone(),
                info_span!("dispatch", session = %self.session_id),
            ),
            spawn_signalling(
                publisher.run(),
                done_tx,
                info_span!("publish", session = %self.session_id),
            ),
        ];

        let signalled = tokio::select! {
            signal = done_rx.recv() => signal.flatten(),
            _ = self.token.cancelled() => None,
        };
        self.token.cancel();

        // A task can observe the shutdown of another before the failing one
        // reaches the signal, so task results and late signals are inspected too.
        let mut outcome = signalled;
        for task in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(SegtailError::Internal {
                    reason: format!("session task failed: {e}"),
                }),
            };
            if outcome.is_none()
                && let Err(err) = result
            {
                outcome = Some(err);
            }
        }
        while let Ok(signal) = done_rx.try_recv() {
            if outcome.is_none() {
                outcome = signal;
            }
        }

        self.state = SessionState::Terminated;
        self.metrics.log_summary(&self.session_id);

        match outcome {
            Some(err) => {
                error!(session = %self.session_id, error = %err, "Session terminated");
                if let Some(status) = &self.status {
                    status.error(&self.session_id, &path, Operation::Stream, &err);
                }
                Err(err)
            }
            None => {
                info!(session = %self.session_id, "Session stopped");
                Ok(())
            }
        }
    }
}

/// Spawns `task` and writes its outcome into the single-slot completion
/// channel. When the slot is already taken the error is kept in the task result.
fn spawn_signalling<F>(
    task: F,
    done: mpsc::Sender<Option<SegtailError>>,
    span: tracing::Span,
) -> JoinHandle<Result<()>>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(
        async move {
            match task.await {
                Ok(()) | Err(SegtailError::Cancelled) => {
                    let _ = done.try_send(None);
                    Ok(())
                }
                Err(err) => match done.try_send(Some(err)) {
                    Ok(()) => Ok(()),
                    Err(TrySendError::Full(Some(err)) | TrySendError::Closed(Some(err))) => {
                        Err(err)
                    }
                    Err(_) => Ok(()),
                },
            }
        }
        .instrument(span),
    )
}
