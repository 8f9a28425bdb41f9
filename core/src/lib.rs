//! Idle-triggered task scheduling.
//!
//! Tasks are queued with a priority and dispatched one at a time when the
//! machine has been idle long enough. See [`orchestrator::Orchestrator`].

pub mod api;
pub mod config;
pub mod decompose;
pub mod error;
pub mod executor;
pub mod idle;
pub mod orchestrator;
pub mod task;
pub mod util;
