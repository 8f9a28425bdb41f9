#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lull_core::api::{
    action_fn, Executor, ExecutorOptions, IdleTrigger, IdleTriggerConfig, ManualClock,
    Orchestrator, StaticIdleSource, TaskAction, TaskResult, TaskStore,
};

/// Execution log shared between actions of one test.
pub type RunLog = Arc<Mutex<Vec<String>>>;

pub fn run_log() -> RunLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(log: &RunLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Action that appends the task id to `log` and succeeds.
pub fn recording_action(log: &RunLog) -> Arc<dyn TaskAction> {
    let log = log.clone();
    action_fn(move |ctx| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(ctx.task.id.clone());
            Ok(TaskResult::ok(format!("ran {}", ctx.task.id)))
        }
    })
}

pub fn failing_action(message: &'static str) -> Arc<dyn TaskAction> {
    action_fn(move |_ctx| async move { Ok(TaskResult::failure(message)) })
}

pub fn options(max_retries: u32) -> ExecutorOptions {
    ExecutorOptions {
        timeout: Duration::from_secs(5),
        max_retries,
        max_concurrent: 1,
    }
}

pub fn trigger_config() -> IdleTriggerConfig {
    IdleTriggerConfig {
        idle_threshold_seconds: 600.0,
        user_silent_threshold_seconds: 300.0,
        cooldown_seconds: 1_800.0,
    }
}

/// Orchestrator on a manual clock that always reports `idle_seconds`.
pub fn orchestrator(idle_seconds: f64, opts: ExecutorOptions) -> (Orchestrator, ManualClock) {
    let clock = ManualClock::default();
    let store = TaskStore::with_clock(Arc::new(clock.clone()));
    let executor = Executor::builder(store)
        .clock(Arc::new(clock.clone()))
        .options(opts)
        .build();
    let orchestrator = Orchestrator::builder(
        Arc::new(executor),
        Arc::new(StaticIdleSource(idle_seconds)),
    )
    .trigger(IdleTrigger::new(trigger_config()))
    .build();
    (orchestrator, clock)
}

/// Step past the trigger cooldown.
pub fn skip_cooldown(clock: &ManualClock) {
    clock.advance(Duration::from_secs(1_801));
}
