//! Task selection and execution.
//!
//! # Architecture
//!
//! ```text
//! TaskStore (all tasks, insertion order)
//!   ↓
//! Scheduler::eligible() → pending, dependencies completed, periodic interval elapsed
//!   ↓ sorted by priority rank (stable)
//! Executor::execute_next() → concurrency guard, claim first candidate
//!   ↓
//! Executor::drive() → attempt under timeout, retry up to max_retries
//!   ↓
//! TaskStore::finish() → completed / failed / pending (periodic)
//! ```

mod engine;
mod graph;
mod scheduler;
pub mod traits;

pub use engine::{
    timeout_message, Executor, ExecutorBuilder, ExecutorOptions, TIMEOUT_ERROR_PREFIX,
};
pub use graph::DependencyGraph;
pub use scheduler::{select_eligible, Scheduler};
pub use traits::RetryStrategyPlugin;
