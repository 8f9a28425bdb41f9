use lull_core::config::RetryConfig;
use lull_core::executor::RetryStrategyPlugin;
use std::time::Duration;

/// Retries right away.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateRetryPlugin;

pub struct ExponentialBackoffPlugin {
    config: RetryConfig,
}

pub struct LinearRetryPlugin {
    config: RetryConfig,
}

impl ExponentialBackoffPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl LinearRetryPlugin {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }
}

impl RetryStrategyPlugin for ImmediateRetryPlugin {
    fn name(&self) -> &str {
        "immediate"
    }

    fn next_delay(&self, _attempt: u32, _error: &str) -> Option<Duration> {
        None
    }
}

impl RetryStrategyPlugin for ExponentialBackoffPlugin {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        let exp = 1u64 << attempt.min(30);
        let delay = self.config.base_delay_ms.saturating_mul(exp);
        Some(Duration::from_millis(delay.min(self.config.max_delay_ms)))
    }

    fn is_fatal_error(&self, error: &str) -> bool {
        is_command_not_found(error)
    }
}

impl RetryStrategyPlugin for LinearRetryPlugin {
    fn name(&self) -> &str {
        "linear"
    }

    fn next_delay(&self, attempt: u32, _error: &str) -> Option<Duration> {
        let multiplier = attempt.saturating_add(1) as u64;
        let delay = self.config.base_delay_ms.saturating_mul(multiplier);
        Some(Duration::from_millis(delay.min(self.config.max_delay_ms)))
    }

    fn is_fatal_error(&self, error: &str) -> bool {
        is_command_not_found(error)
    }
}

// Shell convention: 127 means the command does not exist, waiting will not help.
fn is_command_not_found(error: &str) -> bool {
    error.starts_with("exit code 127")
}
