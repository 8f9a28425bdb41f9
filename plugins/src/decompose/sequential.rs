use lull_core::decompose::DecompositionStrategy;
use lull_core::task::Task;
use regex::Regex;
use std::sync::OnceLock;

use super::{clean_step, subtask};

static LEAD_REGEX: OnceLock<Regex> = OnceLock::new();
static STEP_SEPARATOR_REGEX: OnceLock<Regex> = OnceLock::new();

fn lead_regex() -> &'static Regex {
    LEAD_REGEX.get_or_init(|| {
        Regex::new(r"(?is)^\s*first\b[\s,:]*(.+)$").expect("LEAD_REGEX is valid")
    })
}

fn step_separator_regex() -> &'static Regex {
    STEP_SEPARATOR_REGEX.get_or_init(|| {
        Regex::new(r"(?i)[\s,;]*\b(?:and\s+)?(?:then|after\s+that|finally)\b[\s,:]*")
            .expect("STEP_SEPARATOR_REGEX is valid")
    })
}

/// "first A, then B, then C" → `A` ← `B` ← `C`, each step waiting for the one
/// before it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialStrategy;

impl SequentialStrategy {
    fn steps(description: &str) -> Vec<String> {
        let Some(rest) = lead_regex()
            .captures(description)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
        else {
            return Vec::new();
        };
        let steps: Vec<String> = step_separator_regex()
            .split(rest)
            .map(clean_step)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if steps.len() < 2 {
            return Vec::new();
        }
        steps
    }
}

impl DecompositionStrategy for SequentialStrategy {
    fn name(&self) -> &str {
        "sequential"
    }

    fn matches(&self, description: &str) -> bool {
        !Self::steps(description).is_empty()
    }

    fn decompose(&self, task: &Task) -> Vec<Task> {
        let description = task.description.as_deref().unwrap_or_default();
        let mut out: Vec<Task> = Vec::new();
        for (i, step) in Self::steps(description).iter().enumerate() {
            let previous = out.last().map(|t| t.id.clone());
            out.push(subtask(task, &(i + 1).to_string(), step, previous));
        }
        out
    }
}
