//! 任务存储
//!
//! 所有任务记录的唯一持有者。调度器与执行器只读取快照，状态变更统一经由本模块的方法完成。

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::action::TaskAction;
use super::types::{Task, TaskStats, TaskStatus};
use crate::error::ExecutorError;
use crate::util::{Clock, SystemClock};

/// 重复 id 覆盖时的回调：(被覆盖的旧任务, 新任务)
pub type DuplicateHook = Arc<dyn Fn(&Task, &Task) + Send + Sync>;

/// 任务存储（线程安全，克隆后共享同一份数据）
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<Mutex<StoreInner>>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct StoreInner {
    /// 任务记录：task_id -> Task
    tasks: HashMap<String, Task>,
    /// 任务动作：task_id -> action
    actions: HashMap<String, Arc<dyn TaskAction>>,
    /// 插入顺序（同优先级时保持稳定）
    order: Vec<String>,
    duplicate_hook: Option<DuplicateHook>,
}

impl TaskStore {
    /// 创建使用系统时钟的任务存储
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 设置重复 id 回调
    pub fn set_duplicate_hook<F>(&self, hook: F)
    where
        F: Fn(&Task, &Task) + Send + Sync + 'static,
    {
        self.lock().duplicate_hook = Some(Arc::new(hook));
    }

    /// 插入或覆盖任务（按 id，后写入者生效）
    ///
    /// 返回被覆盖的旧记录。被覆盖的任务保留原来的插入位置。
    pub fn upsert(&self, mut task: Task, action: Arc<dyn TaskAction>) -> Option<Task> {
        if task.created_at.is_none() {
            task.created_at = Some(self.clock.now());
        }

        let (previous, hook) = {
            let mut inner = self.lock();
            let id = task.id.clone();
            let previous = inner.tasks.insert(id.clone(), task.clone());
            inner.actions.insert(id.clone(), action);
            if previous.is_none() {
                inner.order.push(id);
            }
            (previous, inner.duplicate_hook.clone())
        };

        if let Some(old) = previous.as_ref() {
            tracing::warn!(
                task_id = %task.id,
                old_status = %old.status,
                "duplicate task id, replacing existing task"
            );
            if let Some(hook) = hook {
                hook(old, &task);
            }
        }

        previous
    }

    /// 删除任务
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.tasks.remove(id).is_some();
        if removed {
            inner.actions.remove(id);
            inner.order.retain(|k| k != id);
        }
        removed
    }

    /// 获取任务快照
    pub fn get(&self, id: &str) -> Option<Task> {
        self.lock().tasks.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().tasks.contains_key(id)
    }

    /// 获取任务动作
    pub fn action(&self, id: &str) -> Option<Arc<dyn TaskAction>> {
        self.lock().actions.get(id).cloned()
    }

    /// 按插入顺序返回所有任务
    pub fn all_tasks(&self) -> Vec<Task> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    /// 获取任务统计
    pub fn stats(&self) -> TaskStats {
        let inner = self.lock();
        let mut stats = TaskStats {
            total: inner.tasks.len(),
            ..TaskStats::default()
        };

        for task in inner.tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
            }
        }

        stats
    }

    /// 清理已完成的非周期任务，返回删除数量
    pub fn clear_completed(&self) -> usize {
        let mut inner = self.lock();
        let to_remove: Vec<String> = inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed && !t.is_periodic())
            .map(|t| t.id.clone())
            .collect();

        for id in &to_remove {
            inner.tasks.remove(id);
            inner.actions.remove(id);
        }
        inner.order.retain(|id| !to_remove.contains(id));

        to_remove.len()
    }

    /// 将终态任务（completed / failed）重新放回待执行队列
    pub fn requeue(&self, id: &str) -> bool {
        let mut inner = self.lock();
        match inner.tasks.get_mut(id) {
            Some(task) if task.status.is_terminal() => {
                task.status = TaskStatus::Pending;
                true
            }
            _ => false,
        }
    }

    /// pending -> running
    pub(crate) fn try_mark_running(&self, id: &str) -> Result<Task, ExecutorError> {
        let mut inner = self.lock();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| ExecutorError::TaskNotFound(id.to_string()))?;

        if task.status != TaskStatus::Pending {
            return Err(ExecutorError::NotPending {
                task_id: id.to_string(),
                status: task.status.to_string(),
            });
        }

        task.status = TaskStatus::Running;
        Ok(task.clone())
    }

    /// running -> completed / failed（周期任务成功后回到 pending）
    ///
    /// 执行期间若任务被删除或被覆盖（不再是 running），结果被丢弃。
    pub(crate) fn finish(&self, id: &str, success: bool, at: DateTime<Utc>) -> Option<Task> {
        let mut inner = self.lock();
        let Some(task) = inner.tasks.get_mut(id) else {
            tracing::debug!(task_id = %id, "task removed while running, dropping result");
            return None;
        };

        if task.status != TaskStatus::Running {
            tracing::debug!(
                task_id = %id,
                status = %task.status,
                "task replaced while running, dropping result"
            );
            return None;
        }

        task.status = match (success, task.is_periodic()) {
            (true, true) => TaskStatus::Pending,
            (true, false) => TaskStatus::Completed,
            (false, _) => TaskStatus::Failed,
        };
        task.last_run_at = Some(at);
        Some(task.clone())
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::action::action_fn;
    use crate::task::types::{Priority, TaskResult};
    use crate::util::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop() -> Arc<dyn TaskAction> {
        action_fn(|_ctx| async { Ok(TaskResult::ok("")) })
    }

    #[test]
    fn upsert_stamps_created_at_once() {
        let clock = ManualClock::default();
        let store = TaskStore::with_clock(Arc::new(clock.clone()));

        store.upsert(Task::new("a", Priority::Low), noop());
        let first = store.get("a").unwrap().created_at.unwrap();
        assert_eq!(first, clock.now());

        let mut preset = Task::new("b", Priority::Low);
        let earlier = clock.now() - chrono::Duration::hours(1);
        preset.created_at = Some(earlier);
        store.upsert(preset, noop());
        assert_eq!(store.get("b").unwrap().created_at, Some(earlier));
    }

    #[test]
    fn duplicate_upsert_replaces_and_keeps_position() {
        let store = TaskStore::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_hook = hits.clone();
        store.set_duplicate_hook(move |old, new| {
            assert_eq!(old.id, new.id);
            hits_hook.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.upsert(Task::new("a", Priority::Low), noop()).is_none());
        store.upsert(Task::new("b", Priority::Low), noop());
        let replaced = store.upsert(Task::new("a", Priority::High), noop());

        assert_eq!(replaced.map(|t| t.priority), Some(Priority::Low));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let ids: Vec<String> = store.all_tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().priority, Priority::High);
    }

    #[test]
    fn remove_drops_task_and_action() {
        let store = TaskStore::new();
        store.upsert(Task::new("a", Priority::Low), noop());
        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.action("a").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_completed_keeps_periodic_tasks() {
        let store = TaskStore::new();
        store.upsert(Task::new("done", Priority::Low), noop());
        store.upsert(Task::new("tick", Priority::Periodic), noop());
        store.upsert(Task::new("open", Priority::Low), noop());

        {
            let mut inner = store.lock();
            inner.tasks.get_mut("done").unwrap().status = TaskStatus::Completed;
            inner.tasks.get_mut("tick").unwrap().status = TaskStatus::Completed;
        }

        assert_eq!(store.clear_completed(), 1);
        assert!(!store.contains("done"));
        assert!(store.contains("tick"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn finish_folds_periodic_success_back_to_pending() {
        let store = TaskStore::new();
        store.upsert(Task::new("p", Priority::Periodic).with_interval(60), noop());
        store.upsert(Task::new("o", Priority::Medium), noop());
        let now = Utc::now();

        store.try_mark_running("p").unwrap();
        store.try_mark_running("o").unwrap();
        assert_eq!(store.finish("p", true, now).unwrap().status, TaskStatus::Pending);
        assert_eq!(store.finish("o", true, now).unwrap().status, TaskStatus::Completed);
        assert_eq!(store.get("p").unwrap().last_run_at, Some(now));
    }

    #[test]
    fn try_mark_running_requires_pending() {
        let store = TaskStore::new();
        store.upsert(Task::new("a", Priority::Low), noop());
        store.try_mark_running("a").unwrap();

        let err = store.try_mark_running("a").unwrap_err();
        assert!(matches!(err, ExecutorError::NotPending { .. }));
        assert_eq!(
            store.try_mark_running("missing").unwrap_err(),
            ExecutorError::TaskNotFound("missing".to_string())
        );
    }

    #[test]
    fn requeue_only_resets_terminal_tasks() {
        let store = TaskStore::new();
        store.upsert(Task::new("a", Priority::Low), noop());
        assert!(!store.requeue("a"));

        store.try_mark_running("a").unwrap();
        store.finish("a", false, Utc::now());
        assert_eq!(store.stats().failed, 1);
        assert!(store.requeue("a"));
        assert_eq!(store.get("a").unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn stats_count_each_status() {
        let store = TaskStore::new();
        for id in ["a", "b", "c"] {
            store.upsert(Task::new(id, Priority::Low), noop());
        }
        store.try_mark_running("a").unwrap();
        store.try_mark_running("b").unwrap();
        store.finish("b", true, Utc::now());

        let stats = store.stats();
        assert_eq!(
            stats,
            TaskStats {
                total: 3,
                pending: 1,
                running: 1,
                completed: 1,
                failed: 0,
            }
        );
    }
}
