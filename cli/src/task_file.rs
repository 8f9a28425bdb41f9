//! `[[tasks]]` file format for `lull run`.

use std::collections::HashMap;
use std::path::Path;

use lull_core::error::ConfigError;
use lull_core::task::{Priority, Task};
use lull_plugins::action::ShellAction;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TaskEntry {
    /// Random uuid when omitted.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default = "default_priority")]
    pub priority: String,

    pub command: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Minimum gap between runs; only used with `priority = "periodic"`.
    #[serde(default)]
    pub interval_seconds: Option<u64>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub cwd: Option<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_priority() -> String {
    "medium".to_string()
}

/// A task ready to hand to the orchestrator.
#[derive(Debug)]
pub struct PlannedTask {
    pub task: Task,
    pub action: ShellAction,
}

impl TaskEntry {
    fn into_planned(self) -> Result<PlannedTask, ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "tasks.command",
                reason: "must not be empty".to_string(),
            });
        }
        let priority: Priority = self.priority.parse()?;
        let id = self
            .id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut task = Task::new(id, priority).depends_on(self.depends_on);
        if let Some(description) = self.description {
            task = task.with_description(description);
        }
        if let Some(seconds) = self.interval_seconds {
            if !task.is_periodic() {
                tracing::warn!(task_id = %task.id, "interval_seconds ignored for non-periodic task");
            }
            task = task.with_interval(seconds);
        }

        let mut action = ShellAction::new(self.command);
        if let Some(cwd) = self.cwd {
            action = action.current_dir(cwd);
        }
        for (key, value) in self.env {
            action = action.env(key, value);
        }
        Ok(PlannedTask { task, action })
    }
}

pub fn parse_task_file(content: &str, path: &str) -> Result<Vec<PlannedTask>, ConfigError> {
    let file: TaskFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })?;
    file.tasks.into_iter().map(TaskEntry::into_planned).collect()
}

pub fn load_task_file(path: &Path) -> Result<Vec<PlannedTask>, ConfigError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: display.clone(),
        source,
    })?;
    parse_task_file(&content, &display)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
[[tasks]]
id = "backup"
priority = "periodic"
command = "tar czf /tmp/home.tgz ~/notes"
interval_seconds = 86400

[[tasks]]
id = "report"
command = "echo done"
description = "first collect stats, then mail them"
depends_on = ["backup"]
env = { MAILTO = "ops@example.com" }
"#;

    #[test]
    fn parses_entries() {
        let planned = parse_task_file(SAMPLE, "tasks.toml").unwrap();
        assert_eq!(planned.len(), 2);

        let backup = &planned[0].task;
        assert_eq!(backup.id, "backup");
        assert_eq!(backup.priority, Priority::Periodic);
        assert!(backup.is_periodic());
        assert_eq!(backup.interval_seconds, Some(86_400));

        let report = &planned[1].task;
        assert_eq!(report.priority, Priority::Medium);
        assert_eq!(report.depends_on, vec!["backup".to_string()]);
        assert_eq!(
            report.description.as_deref(),
            Some("first collect stats, then mail them")
        );
        assert_eq!(planned[1].action.command(), "echo done");
    }

    #[test]
    fn missing_id_gets_a_uuid() {
        let planned = parse_task_file("[[tasks]]\ncommand = \"true\"\n", "t.toml").unwrap();
        assert!(uuid::Uuid::parse_str(&planned[0].task.id).is_ok());
    }

    #[test]
    fn bad_priority_is_a_config_error() {
        let err = parse_task_file(
            "[[tasks]]\ncommand = \"true\"\npriority = \"urgent\"\n",
            "t.toml",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPriority(p) if p == "urgent"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = parse_task_file("[[tasks]]\ncommand = \"  \"\n", "t.toml").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "tasks.command", .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_task_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
