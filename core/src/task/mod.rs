//! Task model, actions and the task store.

pub mod action;
pub mod store;
pub mod types;

pub use action::{action_fn, ActionContext, FnAction, TaskAction};
pub use store::{DuplicateHook, TaskStore};
pub use types::{MetricValue, Priority, Task, TaskResult, TaskStats, TaskStatus};
