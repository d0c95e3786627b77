use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use crate::error::{PlanError, ValidationIssue, ValidationReport};
use crate::executor::types::{Task, TaskStatus};

/// Task dependency graph (DAG)
///
/// Structural view of a plan: ids, declared dependencies, priorities and the
/// original insertion order. Task statuses are not stored here; operations
/// that depend on them take the task slice explicitly.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    /// Dependency edges: task_id -> list of dependencies (as declared)
    pub edges: HashMap<String, Vec<String>>,

    /// Reverse edges: task_id -> list of tasks that depend on it (known ids only)
    pub reverse_edges: HashMap<String, Vec<String>>,

    priorities: HashMap<String, i32>,

    /// Original insertion order (for stable sorting)
    insertion_order: Vec<String>,
    positions: HashMap<String, usize>,

    /// Ids that appeared more than once; the first occurrence wins
    duplicates: Vec<String>,
}

impl TaskGraph {
    /// Construct task graph from task list
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let mut graph = Self::default();

        for task in tasks {
            if graph.positions.contains_key(&task.id) {
                graph.duplicates.push(task.id.clone());
                continue;
            }

            graph
                .positions
                .insert(task.id.clone(), graph.insertion_order.len());
            graph.insertion_order.push(task.id.clone());
            graph.priorities.insert(task.id.clone(), task.priority);
            graph
                .edges
                .insert(task.id.clone(), task.dependencies.clone());
        }

        // Build reverse edges, restricted to ids present in the plan
        for task_id in &graph.insertion_order {
            for dep in &graph.edges[task_id] {
                if graph.positions.contains_key(dep) {
                    graph
                        .reverse_edges
                        .entry(dep.clone())
                        .or_default()
                        .push(task_id.clone());
                }
            }
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.positions.contains_key(task_id)
    }

    /// Task ids in insertion order
    pub fn ids(&self) -> &[String] {
        &self.insertion_order
    }

    pub fn has_dependencies(&self) -> bool {
        self.edges.values().any(|deps| !deps.is_empty())
    }

    pub fn dependents(&self, task_id: &str) -> &[String] {
        self.reverse_edges
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Validate dependency relationships
    ///
    /// Collects every duplicate id, unknown dependency, self-dependency and
    /// cycle instead of stopping at the first problem.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for dup in &self.duplicates {
            report.push(ValidationIssue::DuplicateTaskId {
                task_id: dup.clone(),
            });
        }

        for task_id in &self.insertion_order {
            for dep in &self.edges[task_id] {
                if dep == task_id {
                    report.push(ValidationIssue::SelfDependency {
                        task_id: task_id.clone(),
                    });
                } else if !self.contains(dep) {
                    report.push(ValidationIssue::UnknownDependency {
                        task_id: task_id.clone(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }

        // Self-loops are already reported above
        if let Some(path) = self.find_cycle(false) {
            report.push(ValidationIssue::Cycle { path });
        }

        report
    }

    /// Detects if the graph contains any cycle, self-loops included.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn has_cycle(&self) -> bool {
        self.find_cycle(true).is_some()
    }

    /// Returns the first cycle found as a path that starts and ends on the same id.
    pub fn cycle_path(&self) -> Option<Vec<String>> {
        self.find_cycle(true)
    }

    /// Topological sort using Kahn's algorithm
    ///
    /// A dependency always precedes the tasks that depend on it. Among tasks
    /// that are ready at the same moment, lower priority goes first, then
    /// insertion order.
    pub fn topological_order(&self) -> Result<Vec<String>, PlanError> {
        if let Some(path) = self.find_cycle(true) {
            return Err(PlanError::CyclicDependency(path.join(" -> ")));
        }

        let mut in_degree = self.in_degrees();
        let mut heap = BinaryHeap::new();

        for task_id in &self.insertion_order {
            if in_degree[task_id.as_str()] == 0 {
                heap.push(Reverse(self.sort_key(task_id)));
            }
        }

        let mut order = Vec::with_capacity(self.len());

        while let Some(Reverse((_, position))) = heap.pop() {
            let task_id = &self.insertion_order[position];
            order.push(task_id.clone());

            for dependent in self.dependents(task_id) {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        heap.push(Reverse(self.sort_key(dependent)));
                    }
                }
            }
        }

        if order.len() != self.len() {
            return Err(PlanError::CyclicDependency(
                "Unable to complete topological sort (cycle detected)".to_string(),
            ));
        }

        Ok(order)
    }

    /// Pending tasks whose every dependency id is in `completed`.
    ///
    /// Sorted by priority ascending, then insertion order.
    pub fn ready_tasks(&self, tasks: &[Task], completed: &HashSet<String>) -> Vec<String> {
        let mut ready: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| t.dependencies.iter().all(|dep| completed.contains(dep)))
            .collect();

        ready.sort_by_key(|t| self.sort_key(&t.id));
        ready.dedup_by(|a, b| a.id == b.id);
        ready.into_iter().map(|t| t.id.clone()).collect()
    }

    /// Groups tasks into levels that may run concurrently.
    ///
    /// Dependency-free tasks are level 0; every other task sits at
    /// 1 + max(level of its dependencies). Levels are filled by breadth-first
    /// propagation from the dependency-free tasks.
    pub fn parallel_levels(&self) -> Result<Vec<Vec<String>>, PlanError> {
        let mut in_degree = self.in_degrees();
        let mut level: HashMap<&str, usize> = HashMap::new();
        let mut queue = VecDeque::new();

        for task_id in &self.insertion_order {
            if in_degree[task_id.as_str()] == 0 {
                level.insert(task_id.as_str(), 0);
                queue.push_back(task_id.as_str());
            }
        }

        let mut processed = 0;

        while let Some(task_id) = queue.pop_front() {
            processed += 1;
            let next_level = level[task_id] + 1;

            for dependent in self.dependents(task_id) {
                let entry = level.entry(dependent.as_str()).or_insert(0);
                *entry = (*entry).max(next_level);

                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        if processed != self.len() {
            let path = self
                .find_cycle(true)
                .map(|p| p.join(" -> "))
                .unwrap_or_else(|| "cycle detected".to_string());
            return Err(PlanError::CyclicDependency(path));
        }

        let depth = level.values().copied().max().map(|m| m + 1).unwrap_or(0);
        let mut levels: Vec<Vec<String>> = vec![Vec::new(); depth];

        for task_id in &self.insertion_order {
            levels[level[task_id.as_str()]].push(task_id.clone());
        }

        for group in &mut levels {
            group.sort_by_key(|id| self.sort_key(id));
        }

        Ok(levels)
    }

    fn sort_key(&self, task_id: &str) -> (i32, usize) {
        (
            self.priorities.get(task_id).copied().unwrap_or(0),
            self.positions.get(task_id).copied().unwrap_or(usize::MAX),
        )
    }

    fn known_deps<'a>(&'a self, task_id: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .get(task_id)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(move |dep| self.positions.contains_key(*dep))
    }

    /// In-degree = number of (known) dependencies of each task
    fn in_degrees(&self) -> HashMap<&str, usize> {
        self.insertion_order
            .iter()
            .map(|id| (id.as_str(), self.known_deps(id).count()))
            .collect()
    }

    fn find_cycle(&self, include_self_loops: bool) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();

        // Every component, in insertion order
        for task_id in &self.insertion_order {
            if visited.contains(task_id.as_str()) {
                continue;
            }
            if let Some(cycle) = self.dfs_cycle(
                task_id,
                include_self_loops,
                &mut visited,
                &mut on_stack,
                &mut path,
            ) {
                return Some(cycle);
            }
        }

        None
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a str,
        include_self_loops: bool,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for dep in self.known_deps(node) {
            if dep == node && !include_self_loops {
                continue;
            }

            // Back edge into the recursion stack
            if on_stack.contains(dep) {
                let start = path.iter().position(|p| *p == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }

            if !visited.contains(dep) {
                if let Some(cycle) =
                    self.dfs_cycle(dep, include_self_loops, visited, on_stack, path)
                {
                    return Some(cycle);
                }
            }
        }

        on_stack.remove(node);
        path.pop();
        None
    }
}
