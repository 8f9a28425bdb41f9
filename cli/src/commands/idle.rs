use chrono::Utc;
use lull_core::config::AppConfig;
use lull_core::error::CliError;
use lull_core::idle::{IdleSource, IdleState, IdleTrigger, IdleTriggerConfig};
use lull_plugins::factory;
use serde::Serialize;

use super::run::to_json;

#[derive(Debug, Serialize)]
struct IdleReport {
    #[serde(flatten)]
    state: IdleState,
    idle_threshold_seconds: f64,
    /// Whether a freshly armed trigger would fire on this snapshot.
    would_trigger: bool,
}

pub async fn handle_idle(cfg: &AppConfig) -> Result<i32, CliError> {
    let idle = factory::build_idle_source(cfg).idle_seconds().await;
    let silent = match factory::build_user_silence_source(cfg) {
        Some(source) => Some(source.idle_seconds().await),
        None => None,
    };
    let now = Utc::now();
    let state = IdleState::new(idle, silent, false, now);
    let trigger_cfg = IdleTriggerConfig::from(&cfg.idle);
    let would_trigger = IdleTrigger::new(trigger_cfg).should_trigger(&state, now);

    let report = IdleReport {
        state,
        idle_threshold_seconds: trigger_cfg.idle_threshold_seconds,
        would_trigger,
    };
    println!("{}", to_json(&report)?);
    Ok(0)
}
