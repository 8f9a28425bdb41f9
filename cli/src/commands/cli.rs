use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lull", version, about = "Run queued tasks while the machine is idle")]
pub struct Args {
    /// Config file to use instead of ~/.lull/config.toml or ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a task file and dispatch tasks on idle heartbeats.
    Run(RunArgs),
    /// Print the current idle snapshot as JSON.
    Idle,
    /// Show how a description would be split into subtasks.
    Plan(PlanArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// TOML file with `[[tasks]]` entries.
    #[arg(long)]
    pub tasks: PathBuf,

    /// Run a single heartbeat and exit.
    #[arg(long)]
    pub once: bool,

    /// With --once: dispatch the next eligible task even if the machine is busy.
    #[arg(long, requires = "once")]
    pub force: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    pub description: String,

    #[arg(long)]
    pub id: Option<String>,

    #[arg(long, default_value = "medium")]
    pub priority: String,
}
