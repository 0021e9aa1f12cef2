//! Canonical test configurations.
//!
//! Single source of truth for limits used across tests, so each test
//! module does not define its own slightly different defaults.

use std::time::Duration;

use crate::infrastructure::config::batch::{ConfirmationConfig, SchedulerConfig};
use crate::runtime::{ConfirmationPolicy, SchedulerLimits};

/// Scheduler with `max_concurrent` slots and no dispatch spacing.
pub fn scheduler(max_concurrent: usize) -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent,
        min_interval_ms: 0,
    }
}

/// Limits with `max_concurrent` slots and `min_interval` spacing.
pub fn limits(max_concurrent: usize, min_interval: Duration) -> SchedulerLimits {
    SchedulerLimits {
        max_concurrent,
        min_interval,
    }
}

/// Confirmation config allowing `max_rounds` round waits with a short
/// per-call timeout.
pub fn confirmation(max_rounds: u64) -> ConfirmationConfig {
    ConfirmationConfig {
        max_rounds,
        round_timeout_secs: 1,
    }
}

/// Policy allowing `max_rounds` round waits, each call bounded by 500ms.
pub fn policy(max_rounds: u64) -> ConfirmationPolicy {
    ConfirmationPolicy::new(max_rounds, Duration::from_millis(500))
}
