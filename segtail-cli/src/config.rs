use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use segtail_engine::{StreamConfig, config};

use crate::error::{AppError, Result};

/// Settings read from `config.toml`. Command line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory of the storage backend; each allocation is a subdirectory.
    pub storage_root: PathBuf,
    pub poll_interval_secs: u64,
    pub queue_capacity: usize,
    pub target_duration: u64,
    /// Seconds between playlist rewrites; the target duration when unset.
    pub publish_interval_secs: Option<u64>,
    pub max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            poll_interval_secs: config::DEFAULT_POLL_INTERVAL.as_secs(),
            queue_capacity: config::DEFAULT_QUEUE_CAPACITY,
            target_duration: config::DEFAULT_TARGET_DURATION,
            publish_interval_secs: None,
            max_attempts: 3,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the default config file when it exists, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("segtail").join("config.toml"))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn stream_config(&self) -> StreamConfig {
        let mut builder = StreamConfig::builder()
            .with_poll_interval(Duration::from_secs(self.poll_interval_secs))
            .with_queue_capacity(self.queue_capacity)
            .with_target_duration(self.target_duration)
            .with_max_attempts(self.max_attempts);
        if let Some(secs) = self.publish_interval_secs {
            builder = builder.with_publish_interval(Duration::from_secs(secs));
        }
        builder.build()
    }
}
