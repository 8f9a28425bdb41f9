use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::task::{Task, TaskStatus, TaskStore};
use crate::util::clock::seconds_between;

/// Priority selector over the task store.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Tasks allowed to run at `now`, highest priority first.
    ///
    /// Recomputed from a fresh store snapshot on every call.
    pub fn eligible(&self, store: &TaskStore, now: DateTime<Utc>) -> Vec<Task> {
        select_eligible(&store.all_tasks(), now)
    }
}

/// Eligibility filter and ordering over tasks given in insertion order.
///
/// 1. keep pending tasks
/// 2. drop tasks with a dependency that is missing or not completed
/// 3. drop periodic tasks still inside their interval since the last run
/// 4. stable sort by priority rank (ties keep input order)
pub fn select_eligible(tasks: &[Task], now: DateTime<Utc>) -> Vec<Task> {
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let mut eligible: Vec<Task> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| dependencies_satisfied(t, &by_id))
        .filter(|t| !in_periodic_cooldown(t, now))
        .cloned()
        .collect();

    // sort_by_key is stable
    eligible.sort_by_key(|t| t.priority.rank());
    eligible
}

fn dependencies_satisfied(task: &Task, by_id: &HashMap<&str, &Task>) -> bool {
    task.depends_on.iter().all(|dep| {
        by_id
            .get(dep.as_str())
            .map(|d| d.status == TaskStatus::Completed)
            .unwrap_or(false)
    })
}

fn in_periodic_cooldown(task: &Task, now: DateTime<Utc>) -> bool {
    if !task.is_periodic() {
        return false;
    }
    match (task.interval_seconds, task.last_run_at) {
        (Some(interval), Some(last_run)) => seconds_between(last_run, now) < interval as f64,
        _ => false,
    }
}
