//! Task decomposition: turn one descriptive task into dependency-linked subtasks.

use std::sync::Arc;

use crate::task::Task;

/// Rule mapping a task description to a replacement set of subtasks.
pub trait DecompositionStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, description: &str) -> bool;

    /// Subtasks replacing `task`. Subtasks that must wait for siblings say so
    /// through `depends_on`.
    fn decompose(&self, task: &Task) -> Vec<Task>;
}

/// Ordered list of strategies; the first match wins.
#[derive(Clone, Default)]
pub struct DecompositionRegistry {
    strategies: Vec<Arc<dyn DecompositionStrategy>>,
}

impl DecompositionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Arc<dyn DecompositionStrategy>) -> &mut Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with(mut self, strategy: Arc<dyn DecompositionStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Split `task` with the first matching strategy.
    ///
    /// Without a description, without a match, or when the matching strategy
    /// produces nothing, the original task comes back unchanged as the only
    /// element. Periodic tasks are never split: they never reach `Completed`,
    /// so chained subtasks would wait forever.
    pub fn decompose(&self, task: Task) -> Vec<Task> {
        if task.is_periodic() {
            return vec![task];
        }
        let Some(description) = task.description.as_deref() else {
            return vec![task];
        };

        let Some(strategy) = self.strategies.iter().find(|s| s.matches(description)) else {
            return vec![task];
        };

        let subtasks = strategy.decompose(&task);
        if subtasks.is_empty() {
            tracing::warn!(
                task_id = %task.id,
                strategy = strategy.name(),
                "strategy matched but produced no subtasks, keeping original task"
            );
            return vec![task];
        }

        tracing::debug!(
            task_id = %task.id,
            strategy = strategy.name(),
            subtasks = subtasks.len(),
            "task decomposed"
        );
        subtasks
    }
}
