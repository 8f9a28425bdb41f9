use lull_core::config::AppConfig;
use lull_core::error::CliError;
use lull_core::task::{Priority, Task};
use lull_plugins::factory;

use super::cli::PlanArgs;
use super::run::to_json;

pub fn handle_plan(args: PlanArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let priority: Priority = args.priority.parse()?;
    let id = args
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let task = Task::new(id, priority).with_description(args.description);

    let tasks = factory::build_decomposer(cfg).decompose(task);
    println!("{}", to_json(&tasks)?);
    Ok(0)
}
