//! Logger configuration

use crate::error::ConfigError;
use log_queue::{DEFAULT_DEPTH, DEFAULT_FRAME_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides, e.g. `USB_LOGGER__QUEUE_DEPTH=8`
pub const ENV_PREFIX: &str = "USB_LOGGER";

/// What the drain task does when the transport reports `Fail`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailPolicy {
    /// Retry immediately, exactly like `Busy`, until the stall guard fires
    RetryUntilTimeout,
    /// Sleep between consecutive failures, doubling from `initial_ms` up to `max_ms`
    Backoff { initial_ms: u64, max_ms: u64 },
    /// Abandon the frame on the first failure
    Drop,
}

impl Default for FailPolicy {
    fn default() -> Self {
        FailPolicy::RetryUntilTimeout
    }
}

/// Configuration for the log pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Number of frames the queue can hold (default: 5)
    pub queue_depth: usize,

    /// Maximum bytes per frame; longer writes are truncated (default: 64)
    pub frame_capacity: usize,

    /// How long a single frame may spin on a busy transport (milliseconds)
    pub stall_timeout_ms: u64,

    /// Pause after a stall before draining resumes (milliseconds)
    pub retry_interval_ms: u64,

    /// Name of the drain thread
    pub task_name: String,

    /// Stack size of the drain thread in bytes
    pub task_stack_size: usize,

    /// Handling of hard transport failures
    pub fail_policy: FailPolicy,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_DEPTH,
            frame_capacity: DEFAULT_FRAME_CAPACITY,
            stall_timeout_ms: 5000,
            retry_interval_ms: 5000,
            task_name: "usb-logger".to_string(),
            task_stack_size: 64 * 1024,
            fail_policy: FailPolicy::RetryUntilTimeout,
        }
    }
}

impl LoggerConfig {
    /// Reference tuning: 5 frames of 64 bytes, 5 s stall timeout and retry interval
    pub fn reference() -> Self {
        Self::default()
    }

    /// Deeper queue and short stall recovery for host-side use
    pub fn low_latency() -> Self {
        Self {
            queue_depth: 64,
            frame_capacity: 256,
            stall_timeout_ms: 250,
            retry_interval_ms: 100,
            fail_policy: FailPolicy::Backoff {
                initial_ms: 1,
                max_ms: 50,
            },
            ..Default::default()
        }
    }

    /// Load from a configuration file (TOML, JSON or YAML by extension),
    /// then apply `USB_LOGGER__*` environment overrides.
    ///
    /// A missing file yields the defaults plus any overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_depth == 0 {
            return Err(ConfigError::Zero("queue_depth"));
        }
        if self.frame_capacity == 0 {
            return Err(ConfigError::Zero("frame_capacity"));
        }
        if self.stall_timeout_ms == 0 {
            return Err(ConfigError::Zero("stall_timeout_ms"));
        }
        if self.task_stack_size == 0 {
            return Err(ConfigError::Zero("task_stack_size"));
        }
        if let FailPolicy::Backoff { initial_ms, max_ms } = self.fail_policy {
            if initial_ms == 0 {
                return Err(ConfigError::Zero("fail_policy.initial_ms"));
            }
            if max_ms < initial_ms {
                return Err(ConfigError::Invalid(format!(
                    "fail_policy.max_ms ({}) is below initial_ms ({})",
                    max_ms, initial_ms
                )));
            }
        }
        Ok(())
    }

    /// Stall timeout as a duration
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    /// Retry interval as a duration
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}
