use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IdleState;
use crate::config::IdleConfig;
use crate::util::clock::seconds_between;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdleTriggerConfig {
    pub idle_threshold_seconds: f64,
    pub user_silent_threshold_seconds: f64,
    pub cooldown_seconds: f64,
}

impl From<&IdleConfig> for IdleTriggerConfig {
    fn from(cfg: &IdleConfig) -> Self {
        Self {
            idle_threshold_seconds: cfg.idle_threshold_seconds as f64,
            user_silent_threshold_seconds: cfg.user_silent_threshold_seconds as f64,
            cooldown_seconds: cfg.cooldown_seconds as f64,
        }
    }
}

impl Default for IdleTriggerConfig {
    fn default() -> Self {
        Self::from(&IdleConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerPhase {
    Armed,
    CoolingDown,
}

/// Debounce state machine deciding when a heartbeat may dispatch work.
///
/// `Armed` until [`mark_triggered`](Self::mark_triggered), then `CoolingDown`
/// until `cooldown_seconds` have passed since that trigger.
#[derive(Debug, Clone)]
pub struct IdleTrigger {
    config: IdleTriggerConfig,
    last_trigger: Option<DateTime<Utc>>,
}

impl IdleTrigger {
    pub fn new(config: IdleTriggerConfig) -> Self {
        Self {
            config,
            last_trigger: None,
        }
    }

    pub fn config(&self) -> &IdleTriggerConfig {
        &self.config
    }

    pub fn phase(&self, now: DateTime<Utc>) -> TriggerPhase {
        match self.last_trigger {
            Some(at) if seconds_between(at, now) < self.config.cooldown_seconds => {
                TriggerPhase::CoolingDown
            }
            _ => TriggerPhase::Armed,
        }
    }

    /// Pure check; nothing changes until `mark_triggered` is called.
    pub fn should_trigger(&self, state: &IdleState, now: DateTime<Utc>) -> bool {
        if self.phase(now) != TriggerPhase::Armed {
            return false;
        }
        if state.system_idle_seconds < self.config.idle_threshold_seconds {
            return false;
        }
        if let Some(silent) = state.user_silent_seconds {
            if silent < self.config.user_silent_threshold_seconds {
                return false;
            }
        }
        !state.has_active_tasks
    }

    pub fn mark_triggered(&mut self, now: DateTime<Utc>) {
        self.last_trigger = Some(now);
    }

    pub fn last_triggered(&self) -> Option<DateTime<Utc>> {
        self.last_trigger
    }

    /// Forget the last trigger and re-arm immediately.
    pub fn reset(&mut self) {
        self.last_trigger = None;
    }
}

impl Default for IdleTrigger {
    fn default() -> Self {
        Self::new(IdleTriggerConfig::default())
    }
}
