use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub idle: IdleConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.heartbeat_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.max_concurrent",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scheduler.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.timeout_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.idle.load_threshold.is_finite() || self.idle.load_threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "idle.load_threshold",
                reason: format!("{} is not a non-negative number", self.idle.load_threshold),
            });
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay_ms",
                reason: "must not be lower than retry.base_delay_ms".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "lull_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Upper bound on overlapping task executions.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Deadline for a single execution attempt.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Additional attempts after the first failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Run descriptive tasks through the decomposition strategies on insert.
    #[serde(default = "default_decompose")]
    pub decompose: bool,
}

fn default_heartbeat_interval_ms() -> u64 {
    60_000
}

fn default_max_concurrent() -> usize {
    1
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    2
}

fn default_decompose() -> bool {
    true
}

impl SchedulerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_concurrent: default_max_concurrent(),
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            decompose: default_decompose(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleConfig {
    #[serde(default = "default_idle_threshold_seconds")]
    pub idle_threshold_seconds: u64,

    #[serde(default = "default_user_silent_threshold_seconds")]
    pub user_silent_threshold_seconds: u64,

    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Probe names tried in order; the first one that answers wins.
    #[serde(default = "default_probes")]
    pub probes: Vec<String>,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Per-core one-minute load under which the machine counts as idle.
    #[serde(default = "default_load_threshold")]
    pub load_threshold: f64,
}

fn default_idle_threshold_seconds() -> u64 {
    600
}

fn default_user_silent_threshold_seconds() -> u64 {
    300
}

fn default_cooldown_seconds() -> u64 {
    1_800
}

fn default_probes() -> Vec<String> {
    ["xprintidle", "ioreg", "loadavg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

fn default_load_threshold() -> f64 {
    0.5
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            idle_threshold_seconds: default_idle_threshold_seconds(),
            user_silent_threshold_seconds: default_user_silent_threshold_seconds(),
            cooldown_seconds: default_cooldown_seconds(),
            probes: default_probes(),
            probe_timeout_ms: default_probe_timeout_ms(),
            load_threshold: default_load_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_strategy")]
    pub strategy: String,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_strategy() -> String {
    "immediate".to_string()
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: default_retry_strategy(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}
