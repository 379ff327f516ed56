use std::time::Duration;

/// Reconnect schedule for failed peer connections
///
/// The default is a fixed 2s delay with no attempt limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Delay before reconnect `attempt` (1-based), or `None` once attempts are exhausted
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt > max => None,
            _ => Some(self.delay),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}
