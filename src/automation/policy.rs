//! Bounded working-status polling.

use std::time::{Duration, Instant};

use crate::config::AutomationConfig;

/// How long to keep asking the scancard whether marking has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    pub fn from_config(config: &AutomationConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts.max(1),
            deadline: config.poll_deadline(),
        }
    }

    /// Whether another poll may be issued after `attempts` polls since `started`.
    pub fn allows(&self, attempts: u32, started: Instant) -> bool {
        if attempts >= self.max_attempts {
            return false;
        }
        match self.deadline {
            Some(deadline) => started.elapsed() < deadline,
            None => true,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&AutomationConfig::default())
    }
}
