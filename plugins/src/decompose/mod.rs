//! Description-driven decomposition strategies.

pub mod parallel_list;
pub mod sequential;

pub use parallel_list::ParallelListStrategy;
pub use sequential::SequentialStrategy;

use lull_core::task::Task;

/// Child of `parent` with id `{parent}-{suffix}`.
///
/// Inherits the parent's priority and dependencies; `after` adds sibling
/// dependencies on top.
pub(crate) fn subtask<I>(parent: &Task, suffix: &str, description: &str, after: I) -> Task
where
    I: IntoIterator<Item = String>,
{
    Task::new(format!("{}-{}", parent.id, suffix), parent.priority)
        .with_description(description.trim())
        .depends_on(parent.depends_on.iter().cloned().chain(after))
}

pub(crate) fn clean_step(step: &str) -> &str {
    step.trim().trim_end_matches(['.', ',', ';']).trim()
}
