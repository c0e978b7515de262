//! # Playlist writer
//!
//! Builds the local HLS media playlist that a player reads while the remote
//! recording is still growing.
//!
//! Entries are appended in memory and become visible on disk when the playlist
//! is flushed. A flush rewrites the whole file: truncate, seek to the start,
//! write the encoded playlist, sync. A reader that opens the file after a flush
//! returned sees a complete playlist; a reader racing a flush may observe a
//! partial file since no temp-file-plus-rename is used.
//!
//! `append` and `flush` take `&mut self`, so sharing the writer behind one
//! [`SharedPlaylist`] lock serializes them.

use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::Duration;

use m3u8_rs::{MediaPlaylist, MediaSegment};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Result, SegtailError};
use crate::metrics::SessionMetrics;

/// Destination of the encoded playlist.
pub trait PlaylistSink: Write + Seek + Send {
    /// Discards the current content.
    fn truncate(&mut self) -> io::Result<()>;

    /// Makes previously written bytes durable.
    fn sync(&mut self) -> io::Result<()>;
}

impl PlaylistSink for File {
    fn truncate(&mut self) -> io::Result<()> {
        self.set_len(0)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl PlaylistSink for Cursor<Vec<u8>> {
    fn truncate(&mut self) -> io::Result<()> {
        self.get_mut().clear();
        self.set_position(0);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub type SharedPlaylist<S = File> = Arc<Mutex<Playlist<S>>>;

pub struct Playlist<S = File> {
    target_duration: u64,
    written: Vec<String>,
    pending: Vec<String>,
    flushes: u64,
    sink: S,
}

impl<S: PlaylistSink> Playlist<S> {
    pub fn new(target_duration: u64, sink: S) -> Self {
        Self {
            target_duration,
            written: Vec::new(),
            pending: Vec::new(),
            flushes: 0,
            sink,
        }
    }

    pub fn into_shared(self) -> SharedPlaylist<S> {
        Arc::new(Mutex::new(self))
    }

    pub fn target_duration(&self) -> u64 {
        self.target_duration
    }

    pub fn append(&mut self, name: impl Into<String>) {
        let name = name.into();
        trace!(entry = %name, "Playlist entry appended");
        self.pending.push(name);
    }

    /// Entries already written to the sink, in append order.
    pub fn written_entries(&self) -> &[String] {
        &self.written
    }

    /// Entries appended since the last flush.
    pub fn pending_entries(&self) -> &[String] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.written.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the sink does not reflect the in-memory entries yet.
    pub fn needs_flush(&self) -> bool {
        self.flushes == 0 || !self.pending.is_empty()
    }

    /// Encodes every entry, written and pending.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let duration = self.target_duration as f32;
        let segments = self
            .written
            .iter()
            .chain(self.pending.iter())
            .map(|name| MediaSegment {
                uri: name.clone(),
                duration,
                ..MediaSegment::empty()
            })
            .collect();

        let playlist = MediaPlaylist {
            version: Some(3),
            target_duration: self.target_duration,
            media_sequence: 0,
            segments,
            ..Default::default()
        };

        let mut out = Vec::with_capacity(64 + self.len() * 32);
        playlist.write_to(&mut out)?;
        Ok(out)
    }

    /// Rewrites the sink with the current snapshot and syncs it.
    pub fn flush(&mut self) -> Result<()> {
        let encoded = self.snapshot()?;
        self.sink.truncate()?;
        self.sink.seek(SeekFrom::Start(0))?;
        self.sink.write_all(&encoded)?;
        self.sink.flush()?;
        self.sink.sync()?;

        let newly_written = self.pending.len();
        self.written.append(&mut self.pending);
        self.flushes += 1;
        debug!(
            entries = self.written.len(),
            newly_written,
            bytes = encoded.len(),
            "Playlist flushed"
        );
        Ok(())
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Periodically flushes a shared playlist until cancelled, then flushes once more.
pub struct PlaylistPublisher<S = File> {
    playlist: SharedPlaylist<S>,
    interval: Duration,
    token: CancellationToken,
    metrics: Arc<SessionMetrics>,
}

impl<S: PlaylistSink + 'static> PlaylistPublisher<S> {
    pub fn new(
        playlist: SharedPlaylist<S>,
        interval: Duration,
        token: CancellationToken,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            playlist,
            interval,
            token,
            metrics,
        }
    }

    pub async fn run(self) -> Result<()> {
        self.publish().await?;
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {
                    self.publish().await?;
                }
            }
        }
        self.publish().await?;
        debug!("Playlist publisher stopped");
        Ok(())
    }

    /// Flushes the playlist if it changed. Returns whether a flush happened.
    pub async fn publish(&self) -> Result<bool> {
        let playlist = Arc::clone(&self.playlist);
        let flushed = tokio::task::spawn_blocking(move || {
            let mut playlist = playlist.lock();
            if !playlist.needs_flush() {
                return Ok(false);
            }
            playlist.flush().map(|_| true)
        })
        .await
        .map_err(|e| SegtailError::Internal {
            reason: format!("playlist flush task failed: {e}"),
        })??;

        if flushed {
            self.metrics.record_flush();
        }
        Ok(flushed)
    }
}
