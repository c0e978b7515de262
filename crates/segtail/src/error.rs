#[derive(Debug, thiserror::Error)]
pub enum SegtailError {
    #[error("session cancelled")]
    Cancelled,

    #[error("missing required argument `{argument}`")]
    MissingArgument { argument: &'static str },

    #[error("share token does not address a directory: {target}")]
    NotADirectory { target: String },

    #[error("failed to resolve source: {reason}")]
    ResolutionFailed { reason: String },

    #[error("remote listing of `{path}` failed: {reason}")]
    RemoteListingFailed { path: String, reason: String },

    #[error("transfer of `{path}` failed: {reason}")]
    TransferFailed {
        path: String,
        reason: String,
        retryable: bool,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl SegtailError {
    pub fn missing_argument(argument: &'static str) -> Self {
        Self::MissingArgument { argument }
    }

    pub fn not_a_directory(target: impl Into<String>) -> Self {
        Self::NotADirectory {
            target: target.into(),
        }
    }

    pub fn resolution_failed(reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            reason: reason.into(),
        }
    }

    pub fn listing_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RemoteListingFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn transfer_failed(
        path: impl Into<String>,
        reason: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::TransferFailed {
            path: path.into(),
            reason: reason.into(),
            retryable,
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Whether retrying the failed operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled
            | Self::MissingArgument { .. }
            | Self::NotADirectory { .. }
            | Self::ResolutionFailed { .. }
            | Self::Configuration { .. } => false,
            Self::TransferFailed { retryable, .. } => *retryable,
            Self::RemoteListingFailed { .. } | Self::Io { .. } | Self::Internal { .. } => true,
        }
    }
}

pub type Result<T, E = SegtailError> = std::result::Result<T, E>;
