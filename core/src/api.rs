//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `lull_core::api` instead of reaching into internal modules.

pub use crate::config::{
    get_lull_data_dir, load_default, load_from_path, AppConfig, IdleConfig, LoggingConfig,
    RetryConfig, SchedulerConfig,
};
pub use crate::decompose::{DecompositionRegistry, DecompositionStrategy};
pub use crate::error::{CliError, ConfigError, ExecutorError};
pub use crate::executor::{
    select_eligible, timeout_message, DependencyGraph, Executor, ExecutorBuilder,
    ExecutorOptions, RetryStrategyPlugin, Scheduler, TIMEOUT_ERROR_PREFIX,
};
pub use crate::idle::{
    clamp_idle_seconds, IdleProbe, IdleSource, IdleState, IdleTrigger, IdleTriggerConfig, ProbeChain,
    StaticIdleSource, TriggerPhase,
};
pub use crate::orchestrator::{
    HeartbeatOutcome, NoopCallbacks, Orchestrator, OrchestratorBuilder, SchedulerCallbacks,
    StatusSnapshot,
};
pub use crate::task::{
    action_fn, ActionContext, MetricValue, Priority, Task, TaskAction, TaskResult, TaskStats,
    TaskStatus, TaskStore,
};
pub use crate::util::{Clock, ManualClock, OutputTail, SystemClock};
