use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Planner-assigned task identifier.
pub type TaskId = u64;

/// Informational priority; used for grouping only, never for scheduling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    #[serde(alias = "high")]
    High,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "low")]
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// One unit of work in a mission. Immutable once the mission launches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tools: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: BTreeSet<TaskId>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub priority_reasoning: String,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            tools: BTreeSet::new(),
            dependencies: BTreeSet::new(),
            priority: Priority::default(),
            priority_reasoning: String::new(),
        }
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    pub fn with_tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    pub fn with_priority(mut self, priority: Priority, reasoning: impl Into<String>) -> Self {
        self.priority = priority;
        self.priority_reasoning = reasoning.into();
        self
    }
}

/// Entry of the planner's tool catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Planner output: the authoritative task graph plus the tool roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionPlan {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_deserializes_planner_json() {
        let json = r#"{
            "tasks": [
                {"id": 1, "name": "Research", "description": "Collect sources",
                 "tools": ["web_search"], "dependencies": [], "priority": "High",
                 "priorityReasoning": "everything else builds on it"},
                {"id": 2, "name": "Draft", "description": "Write it up",
                 "dependencies": [1], "priority": "Low"}
            ],
            "tools": [{"name": "web_search", "description": "Search the web"}]
        }"#;
        let plan: MissionPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].priority, Priority::High);
        assert_eq!(
            plan.tasks[0].priority_reasoning,
            "everything else builds on it"
        );
        assert!(plan.tasks[1].tools.is_empty());
        assert!(plan.tasks[1].dependencies.contains(&1));
        assert_eq!(plan.tools[0].name, "web_search");
    }
}
