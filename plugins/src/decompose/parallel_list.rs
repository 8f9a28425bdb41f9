use lull_core::decompose::DecompositionStrategy;
use lull_core::task::Task;
use regex::Regex;
use std::sync::OnceLock;

use super::{clean_step, subtask};

static LIST_REGEX: OnceLock<Regex> = OnceLock::new();
static ITEM_SEPARATOR_REGEX: OnceLock<Regex> = OnceLock::new();

fn list_regex() -> &'static Regex {
    LIST_REGEX.get_or_init(|| {
        Regex::new(
            r"(?is)^\s*(analy[sz]e|review|check|test|scan|process|compare|audit|summari[sz]e)\s+(.+)$",
        )
        .expect("LIST_REGEX is valid")
    })
}

fn item_separator_regex() -> &'static Regex {
    ITEM_SEPARATOR_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\s*(?:,|;|\band\b)\s*").expect("ITEM_SEPARATOR_REGEX is valid")
    })
}

/// "analyze A, B and C" → one independent subtask per item plus a
/// `{id}-summary` task that waits for all of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelListStrategy;

impl ParallelListStrategy {
    fn items(description: &str) -> Option<(String, Vec<String>)> {
        let caps = list_regex().captures(description)?;
        let verb = caps.get(1)?.as_str().to_lowercase();
        let items: Vec<String> = item_separator_regex()
            .split(caps.get(2)?.as_str())
            .map(clean_step)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        (items.len() >= 2).then_some((verb, items))
    }
}

impl DecompositionStrategy for ParallelListStrategy {
    fn name(&self) -> &str {
        "parallel-list"
    }

    fn matches(&self, description: &str) -> bool {
        Self::items(description).is_some()
    }

    fn decompose(&self, task: &Task) -> Vec<Task> {
        let description = task.description.as_deref().unwrap_or_default();
        let Some((verb, items)) = Self::items(description) else {
            return Vec::new();
        };

        let mut out: Vec<Task> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                subtask(
                    task,
                    &(i + 1).to_string(),
                    &format!("{verb} {item}"),
                    None::<String>,
                )
            })
            .collect();

        let all: Vec<String> = out.iter().map(|t| t.id.clone()).collect();
        out.push(subtask(
            task,
            "summary",
            &format!("summarize: {}", description.trim()),
            all,
        ));
        out
    }
}
