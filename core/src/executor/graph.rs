use std::collections::{HashMap, HashSet};

use crate::task::Task;

/// Dependency view over a set of tasks, used for diagnostics only.
///
/// The scheduler never rejects a task because of its dependencies; this graph
/// lets callers find tasks that can never become eligible.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Dependency edges: task_id -> list of dependencies
    edges: HashMap<String, Vec<String>>,

    /// Original insertion order (for stable output)
    insertion_order: Vec<String>,
}

impl DependencyGraph {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut edges = HashMap::new();
        let mut insertion_order = Vec::with_capacity(tasks.len());

        for task in tasks {
            if edges
                .insert(task.id.clone(), task.depends_on.clone())
                .is_none()
            {
                insertion_order.push(task.id.clone());
            }
        }

        Self {
            edges,
            insertion_order,
        }
    }

    /// (task, dependency) pairs whose dependency is not in the graph.
    pub fn missing_dependencies(&self) -> Vec<(String, String)> {
        let mut missing = Vec::new();
        for task_id in &self.insertion_order {
            for dep in &self.edges[task_id] {
                if !self.edges.contains_key(dep) {
                    missing.push((task_id.clone(), dep.clone()));
                }
            }
        }
        missing
    }

    /// Detect circular dependencies using DFS
    ///
    /// Returns the cycle path formatted as `a -> b -> a`.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn detect_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.insertion_order {
            if !visited.contains(task_id) && self.dfs_cycle(task_id, &mut visited, &mut stack) {
                return Some(format_cycle_path(&stack));
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> bool {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        if let Some(dependencies) = self.edges.get(node) {
            for dep in dependencies {
                // Dependency already on the current path
                if let Some(pos) = stack.iter().position(|x| x == dep) {
                    stack.push(dep.clone());
                    *stack = stack[pos..].to_vec();
                    return true;
                }

                if !visited.contains(dep) && self.dfs_cycle(dep, visited, stack) {
                    return true;
                }
            }
        }

        stack.pop();
        false
    }
}

fn format_cycle_path(stack: &[String]) -> String {
    stack.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Priority;

    #[test]
    fn finds_simple_cycle() {
        let tasks = vec![
            Task::new("a", Priority::Low).depends_on(["b"]),
            Task::new("b", Priority::Low).depends_on(["a"]),
        ];
        let graph = DependencyGraph::from_tasks(&tasks);
        assert_eq!(graph.detect_cycle().as_deref(), Some("a -> b -> a"));
    }

    #[test]
    fn chain_has_no_cycle() {
        let tasks = vec![
            Task::new("a", Priority::Low),
            Task::new("b", Priority::Low).depends_on(["a"]),
            Task::new("c", Priority::Low).depends_on(["a", "b"]),
        ];
        assert!(DependencyGraph::from_tasks(&tasks).detect_cycle().is_none());
    }

    #[test]
    fn lists_missing_dependencies_in_order() {
        let tasks = vec![
            Task::new("a", Priority::Low).depends_on(["x"]),
            Task::new("b", Priority::Low).depends_on(["a", "y"]),
        ];
        assert_eq!(
            DependencyGraph::from_tasks(&tasks).missing_dependencies(),
            vec![
                ("a".to_string(), "x".to_string()),
                ("b".to_string(), "y".to_string()),
            ]
        );
    }
}
