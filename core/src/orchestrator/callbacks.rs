use async_trait::async_trait;

use crate::task::{Task, TaskResult};

/// 编排器事件回调。
///
/// 回调返回的错误或 panic 只会被记录，不会影响心跳和任务状态。
#[async_trait]
pub trait SchedulerCallbacks: Send + Sync {
    /// 空闲触发时调用，参数为本次触发时的可执行任务（按优先级排序）。
    async fn on_trigger(&self, _eligible: &[Task]) -> anyhow::Result<()> {
        Ok(())
    }

    /// 任务执行结束后调用，`task` 为结束后的快照。
    async fn on_task_complete(&self, _task: &Task, _result: &TaskResult) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCallbacks;

impl SchedulerCallbacks for NoopCallbacks {}
