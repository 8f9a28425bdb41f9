//! Idle detection: sources, probe chains and the trigger state machine.

pub mod source;
pub mod trigger;

pub use source::{clamp_idle_seconds, IdleProbe, IdleSource, ProbeChain, StaticIdleSource};
pub use trigger::{IdleTrigger, IdleTriggerConfig, TriggerPhase};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Idle snapshot taken at one heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleState {
    pub system_idle_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_silent_seconds: Option<f64>,
    pub has_active_tasks: bool,
    pub last_activity_time: DateTime<Utc>,
}

impl IdleState {
    /// `last_activity_time` is derived as `now - system_idle_seconds`.
    pub fn new(
        system_idle_seconds: f64,
        user_silent_seconds: Option<f64>,
        has_active_tasks: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let idle_ms = (system_idle_seconds.max(0.0) * 1000.0) as i64;
        let last_activity_time = now
            .checked_sub_signed(Duration::milliseconds(idle_ms))
            .unwrap_or(now);
        Self {
            system_idle_seconds,
            user_silent_seconds,
            has_active_tasks,
            last_activity_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_activity_is_derived_from_idle_time() {
        let now = Utc::now();
        let state = IdleState::new(90.0, None, false, now);
        assert_eq!(state.last_activity_time, now - Duration::seconds(90));
    }
}
