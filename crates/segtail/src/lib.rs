//! Live segment tailing library
//!
//! Follows a remote directory that keeps receiving media segments, transfers
//! every new segment next to a local HLS media playlist and keeps that playlist
//! up to date so a player can start before the recording is finished.
//!
//! ## Component Overview
//!
//! - `source`: validates a play request and resolves the remote directory
//! - `ordering`: length-then-lexical segment ordering
//! - `lister`: ordered listing of the remote segments
//! - `poller`: periodic listing that enqueues newly discovered segments
//! - `dispatcher`: transfers queued segments with retries
//! - `playlist`: HLS playlist writer and its periodic publisher
//! - `session`: ties the tasks together and owns their lifecycle
//! - `storage`: the storage surface consumed by the engine, plus a filesystem backend

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lister;
pub mod metrics;
pub mod ordering;
pub mod playlist;
pub mod poller;
pub mod retry;
pub mod session;
mod snapshot;
pub mod source;
pub mod status;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::{StreamConfig, StreamConfigBuilder};
pub use error::{Result, SegtailError};
pub use lister::{MediaItem, SegmentLister};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use ordering::compare_segment_names;
pub use playlist::{Playlist, PlaylistPublisher, PlaylistSink, SharedPlaylist};
pub use retry::RetryPolicy;
pub use session::{SessionHandle, SessionState, StreamSession};
pub use snapshot::write_playlist_snapshot;
pub use source::{ListMode, SourceRequest};
pub use status::{LogStatus, Operation, StatusCallback};
pub use storage::{ListEntry, LocalStorage, RemoteDirectory, ShareToken, StorageClient};
