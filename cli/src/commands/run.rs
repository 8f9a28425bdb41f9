use std::sync::Arc;

use async_trait::async_trait;
use lull_core::config::AppConfig;
use lull_core::error::CliError;
use lull_core::orchestrator::{HeartbeatOutcome, SchedulerCallbacks};
use lull_core::task::{Task, TaskResult};
use lull_plugins::factory;

use super::cli::RunArgs;
use crate::task_file::load_task_file;

struct LogCallbacks;

#[async_trait]
impl SchedulerCallbacks for LogCallbacks {
    async fn on_trigger(&self, eligible: &[Task]) -> anyhow::Result<()> {
        let ids: Vec<&str> = eligible.iter().map(|t| t.id.as_str()).collect();
        tracing::info!(eligible = ?ids, "machine idle, dispatching");
        Ok(())
    }

    async fn on_task_complete(&self, task: &Task, result: &TaskResult) -> anyhow::Result<()> {
        if result.success {
            tracing::info!(task_id = %task.id, status = task.status.as_str(), "task finished");
        } else {
            tracing::warn!(
                task_id = %task.id,
                error = result.error_message(),
                "task failed"
            );
        }
        Ok(())
    }
}

pub async fn handle_run(args: RunArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let planned = load_task_file(&args.tasks)?;
    let orchestrator = factory::build_orchestrator(cfg)?
        .callbacks(Arc::new(LogCallbacks))
        .build();

    for entry in planned {
        let ids = orchestrator.add_task(entry.task, Arc::new(entry.action));
        tracing::debug!(ids = ?ids, "queued");
    }
    tracing::info!(tasks = orchestrator.store().len(), "task file loaded");

    if args.once {
        let outcome = if args.force {
            match orchestrator.executor().execute_next().await {
                Some((task, result)) => HeartbeatOutcome::Executed {
                    task_id: task.id,
                    success: result.success,
                },
                None => HeartbeatOutcome::NothingEligible,
            }
        } else {
            orchestrator.tick().await
        };
        println!("{}", to_json(&outcome)?);
    } else {
        orchestrator.start();
        tokio::signal::ctrl_c().await?;
        tracing::info!("interrupt received, shutting down");
        orchestrator.stop();
    }

    let status = orchestrator.status().await;
    println!("{}", to_json(&status)?);
    Ok(if status.task_stats.failed > 0 { 1 } else { 0 })
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Anyhow(e.into()))
}
