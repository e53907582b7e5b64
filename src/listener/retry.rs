//! Bounded restart policy for continuous recognition
//!
//! Recognition engines stop on their own (silence timeouts, transient
//! errors). The listener restarts them, but no more than `max_attempts` times
//! in a row and never sooner than `min_interval` after the previous start.

use std::time::{Duration, Instant};

use crate::config::ListenerConfig;

/// Restart limits for the voice command listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Consecutive automatic restarts before giving up
    pub max_attempts: u32,
    /// Minimum time between two recognition starts
    pub min_interval: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_interval: Duration::from_millis(1000),
        }
    }
}

impl From<&ListenerConfig> for RestartPolicy {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            min_interval: config.min_restart_interval,
        }
    }
}

/// Restart bookkeeping for one listening phase
///
/// Time is passed in by the caller so the policy can be driven by a fake clock.
#[derive(Debug, Clone)]
pub struct RestartBudget {
    policy: RestartPolicy,
    attempts: u32,
    last_start: Option<Instant>,
}

impl RestartBudget {
    #[must_use]
    pub const fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            last_start: None,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> RestartPolicy {
        self.policy
    }

    /// Restarts consumed since the last reset
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Note that recognition was (re)started at `now`
    pub const fn record_start(&mut self, now: Instant) {
        self.last_start = Some(now);
    }

    /// Forget consumed attempts, e.g. after the engine heard something
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Consume one attempt and return how long to wait before restarting
    ///
    /// Returns `None` once the budget is exhausted.
    pub fn next_restart(&mut self, now: Instant) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;

        let delay = self.last_start.map_or(self.policy.min_interval, |started| {
            self.policy
                .min_interval
                .saturating_sub(now.saturating_duration_since(started))
        });
        Some(delay)
    }
}
