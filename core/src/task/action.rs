use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::types::{Task, TaskResult};

/// Everything an action gets for one execution attempt.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// Snapshot of the task as it was when the attempt started.
    pub task: Task,
    /// Zero for the first attempt, incremented per retry.
    pub attempt: u32,
    /// Cancelled when the attempt's deadline passes.
    ///
    /// The action future itself is dropped on timeout. Anything the action
    /// spawned outside that future keeps running until it observes this token
    /// or finishes on its own.
    pub cancel: CancellationToken,
}

/// The operation a task performs.
///
/// `Err` and `Ok(TaskResult { success: false, .. })` are both failures and
/// count toward the retry budget.
#[async_trait]
pub trait TaskAction: Send + Sync {
    async fn execute(&self, ctx: ActionContext) -> anyhow::Result<TaskResult>;
}

/// Adapter turning an async closure into a [`TaskAction`].
pub struct FnAction<F> {
    f: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<TaskResult>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskAction for FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<TaskResult>> + Send + 'static,
{
    async fn execute(&self, ctx: ActionContext) -> anyhow::Result<TaskResult> {
        (self.f)(ctx).await
    }
}

/// Shorthand for `Arc::new(FnAction::new(f))`.
pub fn action_fn<F, Fut>(f: F) -> Arc<dyn TaskAction>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<TaskResult>> + Send + 'static,
{
    Arc::new(FnAction::new(f))
}
