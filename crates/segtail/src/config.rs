use std::time::Duration;

use crate::error::{Result, SegtailError};
use crate::retry::RetryPolicy;

/// Default interval between remote listings.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default number of discovered segments that may wait for transfer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Default playlist target duration, in seconds.
pub const DEFAULT_TARGET_DURATION: u64 = 5;

/// Options for one streaming session.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Identifier reported to status callbacks. Defaults to the allocation id.
    pub session_id: Option<String>,

    /// Interval between two remote listings.
    pub poll_interval: Duration,

    /// Capacity of the work queue between the poll loop and the dispatcher.
    /// A full queue blocks the poll loop.
    pub queue_capacity: usize,

    /// `#EXT-X-TARGETDURATION` of the playlist, also used as each entry's duration.
    pub target_duration: u64,

    /// Interval between two playlist flushes. Defaults to the target duration.
    pub publish_interval: Option<Duration>,

    /// Retry policy for segment transfers.
    pub retry: RetryPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            session_id: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            target_duration: DEFAULT_TARGET_DURATION,
            publish_interval: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl StreamConfig {
    pub fn builder() -> StreamConfigBuilder {
        StreamConfigBuilder::new()
    }

    pub fn publish_interval(&self) -> Duration {
        self.publish_interval
            .unwrap_or_else(|| Duration::from_secs(self.target_duration))
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(SegtailError::configuration("poll interval must be non-zero"));
        }
        if self.queue_capacity == 0 {
            return Err(SegtailError::configuration("queue capacity must be non-zero"));
        }
        if self.target_duration == 0 {
            return Err(SegtailError::configuration("target duration must be non-zero"));
        }
        if self.publish_interval().is_zero() {
            return Err(SegtailError::configuration(
                "publish interval must be non-zero",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SegtailError::configuration(
                "at least one transfer attempt is required",
            ));
        }
        Ok(())
    }
}

/// Builder for [`StreamConfig`].
#[derive(Debug, Clone, Default)]
pub struct StreamConfigBuilder {
    config: StreamConfig,
}

impl StreamConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.config.session_id = Some(session_id.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn with_target_duration(mut self, seconds: u64) -> Self {
        self.config.target_duration = seconds;
        self
    }

    pub fn with_publish_interval(mut self, interval: Duration) -> Self {
        self.config.publish_interval = Some(interval);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn build(self) -> StreamConfig {
        self.config
    }
}
