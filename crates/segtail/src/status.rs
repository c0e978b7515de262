use std::fmt;

use tracing::{debug, info, warn};

use crate::error::SegtailError;

/// Operation a status event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// The streaming session as a whole.
    Stream,
    /// Transfer of one segment.
    Download,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Stream => f.write_str("stream"),
            Operation::Download => f.write_str("download"),
        }
    }
}

/// Receiver of session and transfer status events.
///
/// Callbacks are invoked from the session's background tasks and must not block.
pub trait StatusCallback: Send + Sync {
    fn started(&self, session_id: &str, path: &str, op: Operation, total_bytes: u64);

    fn in_progress(&self, _session_id: &str, _path: &str, _op: Operation, _completed_bytes: u64) {}

    fn completed(&self, session_id: &str, path: &str, name: &str, size: u64, op: Operation);

    fn error(&self, session_id: &str, path: &str, op: Operation, err: &SegtailError);
}

/// Status callback that reports every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusCallback for LogStatus {
    fn started(&self, session_id: &str, path: &str, op: Operation, total_bytes: u64) {
        info!(session = session_id, path, %op, total_bytes, "Started");
    }

    fn in_progress(&self, session_id: &str, path: &str, op: Operation, completed_bytes: u64) {
        debug!(session = session_id, path, %op, completed_bytes, "In progress");
    }

    fn completed(&self, session_id: &str, path: &str, name: &str, size: u64, op: Operation) {
        info!(session = session_id, path, name, size, %op, "Completed");
    }

    fn error(&self, session_id: &str, path: &str, op: Operation, err: &SegtailError) {
        warn!(session = session_id, path, %op, error = %err, "Failed");
    }
}
