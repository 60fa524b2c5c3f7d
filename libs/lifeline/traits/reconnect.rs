use std::time::Duration;

/// Trait for defining reconnection delays
///
/// The manager asks the strategy for a delay every time an unexpected close
/// has to be followed by a retry. There is no "give up" answer: persistent
/// failure shows up as the delay growing towards its cap.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Number of retries fired since the last successful open
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff reconnection strategy
///
/// Delays grow geometrically: `base * growth^attempt`, capped at `max` and
/// rounded to whole milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    base: Duration,
    growth: f64,
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `base` - The delay before the first retry
    /// * `growth` - Factor applied for every further consecutive retry
    /// * `max` - The maximum delay between retries
    pub fn new(base: Duration, growth: f64, max: Duration) -> Self {
        Self { base, growth, max }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn growth(&self) -> f64 {
        self.growth
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let grown = self.base.as_millis() as f64 * self.growth.powi(exponent);
        let capped = grown.min(self.max.as_millis() as f64);
        Duration::from_millis(capped.round() as u64)
    }
}
