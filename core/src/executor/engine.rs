use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::ExecutorError;
use crate::task::{ActionContext, Task, TaskAction, TaskResult, TaskStore};
use crate::util::{Clock, SystemClock};

use super::scheduler::Scheduler;
use super::traits::RetryStrategyPlugin;

/// Prefix of the error attached to an attempt that missed its deadline.
pub const TIMEOUT_ERROR_PREFIX: &str = "Task timed out after";

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Deadline per attempt
    pub timeout: Duration,

    /// Additional attempts after the first failure
    pub max_retries: u32,

    /// Maximum overlapping executions started through `execute_next`
    pub max_concurrent: usize,
}

impl ExecutorOptions {
    pub fn from_config(cfg: &SchedulerConfig) -> Self {
        Self {
            timeout: cfg.timeout(),
            max_retries: cfg.max_retries,
            max_concurrent: cfg.max_concurrent.max(1),
        }
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

type RunningSet = Arc<Mutex<HashSet<String>>>;

fn lock_running(running: &RunningSet) -> MutexGuard<'_, HashSet<String>> {
    running.lock().unwrap_or_else(|e| e.into_inner())
}

/// Concurrency slot held for the whole execution of one task.
///
/// Dropping it frees the slot, whether the run finished, panicked or its
/// future was dropped.
struct RunningSlot {
    task_id: String,
    running: RunningSet,
}

impl Drop for RunningSlot {
    fn drop(&mut self) {
        lock_running(&self.running).remove(&self.task_id);
    }
}

/// Runs tasks from the store with per-attempt timeout and bounded retries.
pub struct Executor {
    store: TaskStore,
    scheduler: Scheduler,
    clock: Arc<dyn Clock>,
    opts: ExecutorOptions,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
    running: RunningSet,
}

pub struct ExecutorBuilder {
    store: TaskStore,
    clock: Arc<dyn Clock>,
    opts: ExecutorOptions,
    retry_strategy: Option<Arc<dyn RetryStrategyPlugin>>,
}

impl ExecutorBuilder {
    pub fn new(store: TaskStore) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            opts: ExecutorOptions::default(),
            retry_strategy: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(mut self, opts: ExecutorOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn retry_strategy(mut self, strategy: Arc<dyn RetryStrategyPlugin>) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    pub fn build(self) -> Executor {
        let mut opts = self.opts;
        opts.max_concurrent = opts.max_concurrent.max(1);
        Executor {
            store: self.store,
            scheduler: Scheduler::new(),
            clock: self.clock,
            opts,
            retry_strategy: self.retry_strategy,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

impl Executor {
    pub fn new(store: TaskStore) -> Self {
        ExecutorBuilder::new(store).build()
    }

    pub fn builder(store: TaskStore) -> ExecutorBuilder {
        ExecutorBuilder::new(store)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.opts
    }

    pub fn running_count(&self) -> usize {
        lock_running(&self.running).len()
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        lock_running(&self.running).contains(task_id)
    }

    /// Eligible tasks at the current clock time.
    pub fn eligible(&self) -> Vec<Task> {
        self.scheduler.eligible(&self.store, self.clock.now())
    }

    /// Run one specific pending task now, bypassing the concurrency limit.
    pub async fn run(&self, task_id: &str) -> Result<TaskResult, ExecutorError> {
        let (task, action, slot) = {
            let mut running = lock_running(&self.running);
            if running.contains(task_id) {
                return Err(ExecutorError::AlreadyRunning(task_id.to_string()));
            }
            let action = self
                .store
                .action(task_id)
                .ok_or_else(|| ExecutorError::MissingAction(task_id.to_string()))?;
            let task = self.store.try_mark_running(task_id)?;
            running.insert(task.id.clone());
            let slot = self.slot(&task.id);
            (task, action, slot)
        };

        Ok(self.drive(task, action, slot).await)
    }

    /// Pull the highest-priority eligible task and run it.
    ///
    /// Returns `None` without starting anything when all concurrency slots are
    /// taken or nothing is eligible. The returned task is the post-run snapshot.
    pub async fn execute_next(&self) -> Option<(Task, TaskResult)> {
        let (task, action, slot) = {
            let mut running = lock_running(&self.running);
            if running.len() >= self.opts.max_concurrent {
                tracing::debug!(
                    running = running.len(),
                    max_concurrent = self.opts.max_concurrent,
                    "at capacity, not starting another task"
                );
                return None;
            }

            let mut claimed = None;
            for candidate in self.scheduler.eligible(&self.store, self.clock.now()) {
                if running.contains(&candidate.id) {
                    continue;
                }
                let Some(action) = self.store.action(&candidate.id) else {
                    tracing::warn!(task_id = %candidate.id, "eligible task has no action, skipping");
                    continue;
                };
                match self.store.try_mark_running(&candidate.id) {
                    Ok(task) => {
                        running.insert(task.id.clone());
                        claimed = Some((task, action));
                        break;
                    }
                    Err(e) => tracing::debug!(task_id = %candidate.id, "skip candidate: {e}"),
                }
            }

            let (task, action) = claimed?;
            let slot = self.slot(&task.id);
            (task, action, slot)
        };

        let task_id = task.id.clone();
        let result = self.drive(task.clone(), action, slot).await;
        let snapshot = self.store.get(&task_id).unwrap_or(task);
        Some((snapshot, result))
    }

    fn slot(&self, task_id: &str) -> RunningSlot {
        RunningSlot {
            task_id: task_id.to_string(),
            running: self.running.clone(),
        }
    }

    async fn drive(&self, task: Task, action: Arc<dyn TaskAction>, slot: RunningSlot) -> TaskResult {
        let _slot = slot;
        let start = Instant::now();
        let mut attempt: u32 = 0;

        tracing::info!(task_id = %task.id, priority = %task.priority, "task started");

        loop {
            let result = self.attempt_once(&task, action.as_ref(), attempt).await;
            let finished_at = self.clock.now();

            if result.success {
                self.store.finish(&task.id, true, finished_at);
                tracing::info!(
                    task_id = %task.id,
                    attempts = attempt + 1,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "task completed"
                );
                return result;
            }

            let error = result.error_message().to_string();
            let fatal = self
                .retry_strategy
                .as_ref()
                .map(|s| s.is_fatal_error(&error))
                .unwrap_or(false);

            if attempt >= self.opts.max_retries || fatal {
                self.store.finish(&task.id, false, finished_at);
                tracing::warn!(
                    task_id = %task.id,
                    attempts = attempt + 1,
                    fatal,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "task failed: {error}"
                );
                return result;
            }

            tracing::warn!(
                task_id = %task.id,
                attempt = attempt + 1,
                max_attempts = self.opts.max_retries + 1,
                "attempt failed, retrying: {error}"
            );

            if let Some(delay) = self
                .retry_strategy
                .as_ref()
                .and_then(|s| s.next_delay(attempt, &error))
            {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn attempt_once(&self, task: &Task, action: &dyn TaskAction, attempt: u32) -> TaskResult {
        let cancel = CancellationToken::new();
        let ctx = ActionContext {
            task: task.clone(),
            attempt,
            cancel: cancel.clone(),
        };

        let run = AssertUnwindSafe(action.execute(ctx)).catch_unwind();
        match tokio::time::timeout(self.opts.timeout, run).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => TaskResult::failure(format!("{e:#}")),
            Ok(Err(panic)) => {
                TaskResult::failure(format!("action panicked: {}", panic_message(&*panic)))
            }
            Err(_) => {
                cancel.cancel();
                TaskResult::failure(timeout_message(self.opts.timeout))
            }
        }
    }
}

pub fn timeout_message(timeout: Duration) -> String {
    format!("{TIMEOUT_ERROR_PREFIX} {}s", timeout.as_secs_f64())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
