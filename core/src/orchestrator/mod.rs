//! Heartbeat-driven orchestration: idle check, trigger, dispatch, callbacks.

mod callbacks;

pub use callbacks::{NoopCallbacks, SchedulerCallbacks};

use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::decompose::DecompositionRegistry;
use crate::executor::{DependencyGraph, Executor};
use crate::idle::{clamp_idle_seconds, IdleSource, IdleState, IdleTrigger, TriggerPhase};
use crate::task::{Task, TaskAction, TaskStats, TaskStore};

/// What a single heartbeat did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HeartbeatOutcome {
    /// Idle conditions not met, or the trigger is cooling down.
    NotIdle,
    /// Idle, but no task is eligible.
    NothingEligible,
    /// Triggered, but every concurrency slot was taken when dispatching.
    AtCapacity,
    Executed { task_id: String, success: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub idle_state: IdleState,
    pub task_stats: TaskStats,
    pub trigger_phase: TriggerPhase,
    pub last_triggered: Option<DateTime<Utc>>,
}

struct Heartbeat {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct OrchestratorInner {
    executor: Arc<Executor>,
    idle_source: Arc<dyn IdleSource>,
    user_silence_source: Option<Arc<dyn IdleSource>>,
    decomposer: DecompositionRegistry,
    callbacks: Arc<dyn SchedulerCallbacks>,
    trigger: Mutex<IdleTrigger>,
    heartbeat_interval: Duration,
    timer: Mutex<Option<Heartbeat>>,
}

/// Owns the heartbeat and wires idle trigger, scheduler and executor together.
///
/// Cheap to clone; clones control the same heartbeat.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

pub struct OrchestratorBuilder {
    executor: Arc<Executor>,
    idle_source: Arc<dyn IdleSource>,
    user_silence_source: Option<Arc<dyn IdleSource>>,
    decomposer: DecompositionRegistry,
    callbacks: Arc<dyn SchedulerCallbacks>,
    trigger: IdleTrigger,
    heartbeat_interval: Duration,
}

impl OrchestratorBuilder {
    pub fn new(executor: Arc<Executor>, idle_source: Arc<dyn IdleSource>) -> Self {
        Self {
            executor,
            idle_source,
            user_silence_source: None,
            decomposer: DecompositionRegistry::new(),
            callbacks: Arc::new(NoopCallbacks),
            trigger: IdleTrigger::default(),
            heartbeat_interval: Duration::from_millis(60_000),
        }
    }

    pub fn user_silence_source(mut self, source: Arc<dyn IdleSource>) -> Self {
        self.user_silence_source = Some(source);
        self
    }

    pub fn decomposer(mut self, decomposer: DecompositionRegistry) -> Self {
        self.decomposer = decomposer;
        self
    }

    pub fn callbacks(mut self, callbacks: Arc<dyn SchedulerCallbacks>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn trigger(mut self, trigger: IdleTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            inner: Arc::new(OrchestratorInner {
                executor: self.executor,
                idle_source: self.idle_source,
                user_silence_source: self.user_silence_source,
                decomposer: self.decomposer,
                callbacks: self.callbacks,
                trigger: Mutex::new(self.trigger),
                heartbeat_interval: self.heartbeat_interval,
                timer: Mutex::new(None),
            }),
        }
    }
}

impl Orchestrator {
    pub fn builder(executor: Arc<Executor>, idle_source: Arc<dyn IdleSource>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(executor, idle_source)
    }

    pub fn store(&self) -> &TaskStore {
        self.inner.executor.store()
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.inner.executor
    }

    /// Decompose `task` and enqueue the result.
    ///
    /// Returns the ids actually inserted. When a strategy splits the task the
    /// parent id is not among them; every subtask shares `action`.
    pub fn add_task(&self, task: Task, action: Arc<dyn TaskAction>) -> Vec<String> {
        let parent_id = task.id.clone();
        let tasks = self.inner.decomposer.decompose(task);
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();

        for task in tasks {
            self.store().upsert(task, action.clone());
        }

        if ids.len() > 1 || ids.first() != Some(&parent_id) {
            tracing::info!(task_id = %parent_id, subtasks = ?ids, "task split into subtasks");
        }
        self.inner.check_dependencies();
        ids
    }

    /// Insert without decomposition.
    pub fn enqueue(&self, task: Task, action: Arc<dyn TaskAction>) -> Option<Task> {
        let replaced = self.store().upsert(task, action);
        self.inner.check_dependencies();
        replaced
    }

    pub fn remove_task(&self, id: &str) -> bool {
        self.store().remove(id)
    }

    pub fn clear_completed(&self) -> usize {
        self.store().clear_completed()
    }

    pub fn is_running(&self) -> bool {
        self.inner.timer().is_some()
    }

    /// Start the heartbeat. Returns `false` if it was already running.
    ///
    /// Must be called from within a tokio runtime. The first tick fires one
    /// interval after start; each tick runs as its own task so a long
    /// execution never delays the next tick.
    pub fn start(&self) -> bool {
        let mut timer = self.inner.timer();
        if timer.is_some() {
            tracing::debug!("orchestrator already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let weak: Weak<OrchestratorInner> = Arc::downgrade(&self.inner);
        let period = self.inner.heartbeat_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        tokio::spawn(async move {
                            inner.tick().await;
                        });
                    }
                }
            }
            tracing::debug!("heartbeat loop exited");
        });

        *timer = Some(Heartbeat { cancel, handle });
        tracing::info!(
            heartbeat_ms = period.as_millis() as u64,
            "orchestrator started"
        );
        true
    }

    /// Stop the heartbeat. Returns `false` if it was not running.
    ///
    /// Tasks already executing finish normally; task and trigger state are kept.
    pub fn stop(&self) -> bool {
        let Some(heartbeat) = self.inner.timer().take() else {
            return false;
        };
        heartbeat.cancel.cancel();
        drop(heartbeat.handle);
        tracing::info!("orchestrator stopped");
        true
    }

    /// Run one heartbeat now.
    pub async fn tick(&self) -> HeartbeatOutcome {
        self.inner.tick().await
    }

    pub async fn idle_state(&self) -> IdleState {
        self.inner.sample_idle_state().await
    }

    pub async fn status(&self) -> StatusSnapshot {
        let idle_state = self.inner.sample_idle_state().await;
        let now = self.inner.executor.clock().now();
        let (trigger_phase, last_triggered) = {
            let trigger = self.inner.lock_trigger();
            (trigger.phase(now), trigger.last_triggered())
        };
        StatusSnapshot {
            is_running: self.is_running(),
            idle_state,
            task_stats: self.store().stats(),
            trigger_phase,
            last_triggered,
        }
    }
}

impl OrchestratorInner {
    fn timer(&self) -> MutexGuard<'_, Option<Heartbeat>> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_trigger(&self) -> MutexGuard<'_, IdleTrigger> {
        self.trigger.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sample_idle_state(&self) -> IdleState {
        let system_idle = clamp_idle_seconds(self.idle_source.idle_seconds().await);
        let user_silent = match &self.user_silence_source {
            Some(source) => Some(clamp_idle_seconds(source.idle_seconds().await)),
            None => None,
        };
        let has_active_tasks = self.executor.running_count() > 0;
        IdleState::new(
            system_idle,
            user_silent,
            has_active_tasks,
            self.executor.clock().now(),
        )
    }

    async fn tick(&self) -> HeartbeatOutcome {
        let span = tracing::debug_span!("heartbeat", tick_id = %Uuid::new_v4());
        self.tick_inner().instrument(span).await
    }

    async fn tick_inner(&self) -> HeartbeatOutcome {
        let state = self.sample_idle_state().await;
        let now = self.executor.clock().now();

        if !self.lock_trigger().should_trigger(&state, now) {
            tracing::trace!(idle_seconds = state.system_idle_seconds, "not triggering");
            return HeartbeatOutcome::NotIdle;
        }

        let eligible = self.executor.eligible();
        if eligible.is_empty() {
            tracing::debug!("idle, but nothing eligible");
            return HeartbeatOutcome::NothingEligible;
        }

        // Re-check and arm the cooldown in one critical section so overlapping
        // ticks cannot both fire. on_trigger therefore observes CoolingDown.
        {
            let mut trigger = self.lock_trigger();
            if !trigger.should_trigger(&state, now) {
                return HeartbeatOutcome::NotIdle;
            }
            trigger.mark_triggered(now);
        }

        tracing::info!(
            idle_seconds = state.system_idle_seconds,
            eligible = eligible.len(),
            "idle trigger fired"
        );
        isolate("on_trigger", self.callbacks.on_trigger(&eligible)).await;

        match self.executor.execute_next().await {
            Some((task, result)) => {
                isolate(
                    "on_task_complete",
                    self.callbacks.on_task_complete(&task, &result),
                )
                .await;
                HeartbeatOutcome::Executed {
                    task_id: task.id,
                    success: result.success,
                }
            }
            None => HeartbeatOutcome::AtCapacity,
        }
    }

    fn check_dependencies(&self) {
        let graph = DependencyGraph::from_tasks(&self.executor.store().all_tasks());
        if let Some(cycle) = graph.detect_cycle() {
            tracing::warn!(%cycle, "dependency cycle, these tasks can never run");
        }
        for (task_id, dep) in graph.missing_dependencies() {
            tracing::debug!(%task_id, %dep, "dependency not present yet");
        }
    }
}

impl Drop for OrchestratorInner {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.timer().take() {
            heartbeat.cancel.cancel();
        }
    }
}

/// Run a callback so that neither its error nor its panic escapes.
async fn isolate<F>(name: &'static str, fut: F)
where
    F: Future<Output = anyhow::Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(callback = name, "callback failed: {e:#}"),
        Err(_) => tracing::warn!(callback = name, "callback panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorOptions;
    use crate::idle::{IdleTriggerConfig, StaticIdleSource};
    use crate::task::{action_fn, Priority, TaskResult, TaskStatus};
    use crate::util::ManualClock;

    fn setup(idle: f64) -> (Orchestrator, ManualClock) {
        let clock = ManualClock::default();
        let store = TaskStore::with_clock(Arc::new(clock.clone()));
        let executor = Arc::new(
            Executor::builder(store)
                .clock(Arc::new(clock.clone()))
                .options(ExecutorOptions {
                    timeout: Duration::from_secs(5),
                    max_retries: 0,
                    max_concurrent: 1,
                })
                .build(),
        );
        let orchestrator = Orchestrator::builder(executor, Arc::new(StaticIdleSource(idle)))
            .trigger(IdleTrigger::new(IdleTriggerConfig {
                idle_threshold_seconds: 600.0,
                user_silent_threshold_seconds: 300.0,
                cooldown_seconds: 1_800.0,
            }))
            .build();
        (orchestrator, clock)
    }

    fn ok_action() -> Arc<dyn TaskAction> {
        action_fn(|ctx| async move { Ok(TaskResult::ok(ctx.task.id)) })
    }

    #[tokio::test]
    async fn tick_runs_highest_priority_task() {
        let (orchestrator, _clock) = setup(700.0);
        orchestrator.add_task(Task::new("low", Priority::Low), ok_action());
        orchestrator.add_task(Task::new("crit", Priority::Critical), ok_action());

        let outcome = orchestrator.tick().await;
        assert_eq!(
            outcome,
            HeartbeatOutcome::Executed {
                task_id: "crit".to_string(),
                success: true
            }
        );
        assert_eq!(
            orchestrator.store().get("crit").unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn tick_respects_cooldown() {
        let (orchestrator, clock) = setup(700.0);
        orchestrator.add_task(Task::new("a", Priority::Low), ok_action());
        orchestrator.add_task(Task::new("b", Priority::Low), ok_action());

        assert!(matches!(
            orchestrator.tick().await,
            HeartbeatOutcome::Executed { .. }
        ));
        clock.advance(Duration::from_secs(10));
        assert_eq!(orchestrator.tick().await, HeartbeatOutcome::NotIdle);

        clock.advance(Duration::from_secs(1_800));
        assert!(matches!(
            orchestrator.tick().await,
            HeartbeatOutcome::Executed { .. }
        ));
    }

    #[tokio::test]
    async fn nothing_eligible_does_not_arm_cooldown() {
        let (orchestrator, _clock) = setup(700.0);
        assert_eq!(orchestrator.tick().await, HeartbeatOutcome::NothingEligible);

        orchestrator.add_task(Task::new("late", Priority::Low), ok_action());
        assert!(matches!(
            orchestrator.tick().await,
            HeartbeatOutcome::Executed { .. }
        ));
    }

    #[tokio::test]
    async fn busy_machine_does_nothing() {
        let (orchestrator, _clock) = setup(30.0);
        orchestrator.add_task(Task::new("a", Priority::Critical), ok_action());
        assert_eq!(orchestrator.tick().await, HeartbeatOutcome::NotIdle);
        assert_eq!(orchestrator.store().stats().pending, 1);
    }

    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl SchedulerCallbacks for Recording {
        async fn on_trigger(&self, eligible: &[Task]) -> anyhow::Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("trigger:{}", eligible.len()));
            anyhow::bail!("listener unavailable")
        }

        async fn on_task_complete(&self, task: &Task, _result: &TaskResult) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(format!("done:{}", task.id));
            if task.id == "a" {
                panic!("listener bug");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn callback_failures_are_contained() {
        let clock = ManualClock::default();
        let store = TaskStore::with_clock(Arc::new(clock.clone()));
        let executor = Arc::new(Executor::builder(store).clock(Arc::new(clock)).build());
        let recording = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        let orchestrator = Orchestrator::builder(executor, Arc::new(StaticIdleSource(10_000.0)))
            .callbacks(recording.clone())
            .build();
        orchestrator.add_task(Task::new("a", Priority::High), ok_action());
        orchestrator.add_task(Task::new("b", Priority::Low), ok_action());

        let outcome = orchestrator.tick().await;
        assert_eq!(
            outcome,
            HeartbeatOutcome::Executed {
                task_id: "a".to_string(),
                success: true
            }
        );
        assert_eq!(
            *recording.seen.lock().unwrap(),
            vec!["trigger:2".to_string(), "done:a".to_string()]
        );
        assert_eq!(
            orchestrator.store().get("a").unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn decomposed_task_enqueues_only_subtasks() {
        use crate::decompose::DecompositionStrategy;

        struct Halves;

        impl DecompositionStrategy for Halves {
            fn name(&self) -> &str {
                "halves"
            }

            fn matches(&self, description: &str) -> bool {
                description.starts_with("split")
            }

            fn decompose(&self, task: &Task) -> Vec<Task> {
                let first = Task::new(format!("{}-1", task.id), task.priority);
                let second = Task::new(format!("{}-2", task.id), task.priority)
                    .depends_on([first.id.clone()]);
                vec![first, second]
            }
        }

        let (base, _clock) = setup(700.0);
        let orchestrator = Orchestrator::builder(
            base.executor().clone(),
            Arc::new(StaticIdleSource(700.0)),
        )
        .decomposer(DecompositionRegistry::new().with(Arc::new(Halves)))
        .build();

        let ids = orchestrator.add_task(
            Task::new("job", Priority::Medium).with_description("split it"),
            ok_action(),
        );
        assert_eq!(ids, vec!["job-1".to_string(), "job-2".to_string()]);
        assert!(!orchestrator.store().contains("job"));

        let plain = orchestrator.add_task(
            Task::new("plain", Priority::Medium).with_description("nothing to split"),
            ok_action(),
        );
        assert_eq!(plain, vec!["plain".to_string()]);

        let periodic = orchestrator.add_task(
            Task::new("nightly", Priority::Periodic)
                .with_interval(86_400)
                .with_description("split fetch and publish"),
            ok_action(),
        );
        assert_eq!(periodic, vec!["nightly".to_string()]);
        assert_eq!(
            orchestrator.store().get("nightly").unwrap().interval_seconds,
            Some(86_400)
        );
    }

    #[tokio::test]
    async fn non_finite_idle_reading_counts_as_busy() {
        struct Broken;

        #[async_trait::async_trait]
        impl IdleSource for Broken {
            async fn idle_seconds(&self) -> f64 {
                f64::NAN
            }
        }

        let (base, _clock) = setup(700.0);
        let orchestrator = Orchestrator::builder(base.executor().clone(), Arc::new(Broken)).build();
        orchestrator.add_task(Task::new("a", Priority::High), ok_action());

        assert_eq!(orchestrator.tick().await, HeartbeatOutcome::NotIdle);
        assert_eq!(orchestrator.idle_state().await.system_idle_seconds, 0.0);
        assert_eq!(
            orchestrator.store().get("a").unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_loop_dispatches_after_one_interval() {
        let (orchestrator, _clock) = setup(700.0);
        let orchestrator = Orchestrator::builder(
            orchestrator.executor().clone(),
            Arc::new(StaticIdleSource(700.0)),
        )
        .heartbeat_interval(Duration::from_millis(100))
        .build();
        orchestrator.add_task(Task::new("a", Priority::Low), ok_action());

        assert!(orchestrator.start());
        tokio::task::yield_now().await;
        assert_eq!(orchestrator.store().stats().completed, 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(orchestrator.store().stats().completed, 1);
        assert!(orchestrator.stop());
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let (orchestrator, _clock) = setup(700.0);
        assert!(!orchestrator.stop());
        assert!(orchestrator.start());
        assert!(!orchestrator.start());
        assert!(orchestrator.is_running());
        assert!(orchestrator.stop());
        assert!(!orchestrator.stop());
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn status_reports_stats_and_phase() {
        let (orchestrator, _clock) = setup(700.0);
        orchestrator.add_task(Task::new("a", Priority::Low), ok_action());
        orchestrator.tick().await;

        let status = orchestrator.status().await;
        assert!(!status.is_running);
        assert_eq!(status.task_stats.completed, 1);
        assert_eq!(status.trigger_phase, TriggerPhase::CoolingDown);
        assert_eq!(status.idle_state.system_idle_seconds, 700.0);
        assert!(!status.idle_state.has_active_tasks);
    }
}
