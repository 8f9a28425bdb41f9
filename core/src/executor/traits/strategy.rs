use std::time::Duration;

/// 重试策略插件
///
/// The executor owns the attempt budget (`max_retries`); a strategy only
/// decides how long to wait between attempts and which errors are not worth
/// retrying.
pub trait RetryStrategyPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Delay before the retry that follows failed attempt `attempt` (0-based).
    /// `None` retries immediately.
    fn next_delay(&self, attempt: u32, error: &str) -> Option<Duration>;

    fn is_fatal_error(&self, _error: &str) -> bool {
        false
    }
}
