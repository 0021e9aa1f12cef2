//! Scheduler, confirmation and batch configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

const fn default_max_concurrent() -> usize {
    10
}

const fn default_min_interval_ms() -> u64 {
    100 // 10 dispatches per second
}

const fn default_max_rounds() -> u64 {
    10
}

const fn default_round_timeout_secs() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Admission control for batch tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of transfers in flight at once.
    ///
    /// Defaults to 10.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum spacing between two task dispatches (milliseconds).
    ///
    /// Defaults to 100ms.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl SchedulerConfig {
    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

/// Bounds on waiting for a transfer to commit.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    /// Rounds to wait for a commit before declaring the transfer expired.
    ///
    /// Defaults to 10.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u64,

    /// Wall-clock bound on a single round wait (seconds).
    ///
    /// A node that stops producing rounds fails the wait instead of
    /// blocking the batch. Defaults to 30.
    #[serde(default = "default_round_timeout_secs")]
    pub round_timeout_secs: u64,
}

impl ConfirmationConfig {
    #[must_use]
    pub const fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            round_timeout_secs: default_round_timeout_secs(),
        }
    }
}

/// Batch-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Directory receiving failure files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Stop dispatching new transfers after this many seconds.
    ///
    /// In-flight transfers still run to their own confirmation bound.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl BatchConfig {
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            deadline_secs: None,
        }
    }
}
