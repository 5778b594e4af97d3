use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::MissionError;

use super::types::{Task, TaskId};

/// Issues found by [`TaskGraph::diagnose`]. Advisory only: the scheduler still
/// launches and relies on deadlock detection to terminate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphDiagnostics {
    /// (task, missing dependency) pairs.
    pub missing: Vec<(TaskId, TaskId)>,
    /// One dependency cycle, if any, as a closed path.
    pub cycle: Option<Vec<TaskId>>,
}

impl GraphDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.cycle.is_none()
    }
}

/// Task dependency graph of one mission.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Task nodes: task_id -> Task
    nodes: HashMap<TaskId, Task>,

    /// Reverse edges: task_id -> tasks that list it as a dependency
    reverse_edges: HashMap<TaskId, Vec<TaskId>>,

    /// Original insertion order (for stable iteration)
    insertion_order: Vec<TaskId>,
}

impl TaskGraph {
    /// Construct task graph from task list
    pub fn from_tasks(tasks: &[Task]) -> Result<Self, MissionError> {
        let mut nodes = HashMap::new();
        let mut reverse_edges: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut insertion_order = Vec::new();

        for task in tasks {
            if nodes.contains_key(&task.id) {
                return Err(MissionError::DuplicateTaskId(task.id));
            }

            for dep in &task.dependencies {
                reverse_edges.entry(*dep).or_default().push(task.id);
            }

            nodes.insert(task.id, task.clone());
            insertion_order.push(task.id);
        }

        Ok(Self {
            nodes,
            reverse_edges,
            insertion_order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Tasks in planner order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.insertion_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn ids(&self) -> &[TaskId] {
        &self.insertion_order
    }

    /// Tasks that list `id` directly in their dependencies.
    pub fn dependents(&self, id: TaskId) -> &[TaskId] {
        self.reverse_edges
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `id` plus every task depending on it directly or transitively.
    ///
    /// Breadth-first over reverse edges; cycles are harmless since each id is
    /// visited once.
    pub fn dependents_closure(&self, id: TaskId) -> BTreeSet<TaskId> {
        let mut closure = BTreeSet::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            if !closure.insert(current) {
                continue;
            }
            for dependent in self.dependents(current) {
                if !closure.contains(dependent) {
                    queue.push_back(*dependent);
                }
            }
        }

        closure
    }

    /// Report dangling dependency ids and one dependency cycle, if present.
    pub fn diagnose(&self) -> GraphDiagnostics {
        let mut missing = Vec::new();
        for task in self.tasks() {
            for dep in &task.dependencies {
                if !self.nodes.contains_key(dep) {
                    missing.push((task.id, *dep));
                }
            }
        }

        GraphDiagnostics {
            missing,
            cycle: self.detect_cycle(),
        }
    }

    /// Layers of tasks that could run together if every task succeeds
    /// (Kahn's algorithm). Tasks blocked by a missing id or a cycle are left
    /// out.
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    pub fn planned_layers(&self) -> Vec<Vec<TaskId>> {
        let mut in_degree: HashMap<TaskId, usize> = HashMap::new();
        let mut blocked: HashSet<TaskId> = HashSet::new();

        for task in self.tasks() {
            if task.dependencies.iter().any(|d| !self.nodes.contains_key(d)) {
                blocked.insert(task.id);
            }
            in_degree.insert(task.id, task.dependencies.len());
        }

        let mut layers = Vec::new();
        let mut current: Vec<TaskId> = self
            .insertion_order
            .iter()
            .copied()
            .filter(|id| in_degree.get(id) == Some(&0) && !blocked.contains(id))
            .collect();

        while !current.is_empty() {
            let mut next = Vec::new();
            for id in &current {
                for dependent in self.dependents(*id) {
                    let Some(degree) = in_degree.get_mut(dependent) else {
                        continue;
                    };
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 && !blocked.contains(dependent) {
                        next.push(*dependent);
                    }
                }
            }
            // Preserve input order
            next.sort_by_key(|id| {
                self.insertion_order
                    .iter()
                    .position(|k| k == id)
                    .unwrap_or(usize::MAX)
            });
            layers.push(std::mem::take(&mut current));
            current = next;
        }

        layers
    }

    /// Detect circular dependencies using DFS
    ///
    /// O(V + E) where V = number of tasks, E = number of dependencies
    fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.insertion_order {
            if !visited.contains(task_id) && self.dfs_cycle(*task_id, &mut visited, &mut stack) {
                return Some(stack);
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: TaskId,
        visited: &mut HashSet<TaskId>,
        stack: &mut Vec<TaskId>,
    ) -> bool {
        visited.insert(node);
        stack.push(node);

        if let Some(task) = self.nodes.get(&node) {
            for dep in &task.dependencies {
                // Dependency already on the current path: cycle
                if let Some(pos) = stack.iter().position(|x| x == dep) {
                    stack.push(*dep);
                    *stack = stack[pos..].to_vec();
                    return true;
                }

                if !visited.contains(dep) && self.dfs_cycle(*dep, visited, stack) {
                    return true;
                }
            }
        }

        stack.pop();
        false
    }
}

pub fn format_path(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
