use thiserror::Error;

/// Caller-facing executor errors.
///
/// Task failures never show up here: a failing, panicking or timed out action
/// always ends as a `TaskResult` with `success == false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("No action registered for task '{0}'")]
    MissingAction(String),

    #[error("Task '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Task '{task_id}' is not pending (status: {status})")]
    NotPending { task_id: String, status: String },
}
