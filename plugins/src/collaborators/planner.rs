use async_trait::async_trait;
use serde_json::{json, Value};

use missionflow_core::api::{
    ConversationTurn, MissionPlan, Planner, RemoteError, ResilientClient, StructuredRequest,
};

const PLANNER_SYSTEM: &str = "You break a mission into a small set of concrete tasks. \
Each task has a unique integer id, a short name, a description, the tools it may use, \
the ids of tasks it depends on, a priority (High, Medium or Low) and a one-sentence \
priorityReasoning. Dependencies must refer to ids in the same plan and must not form cycles. \
Answer with JSON only.";

/// Planner backed by a structured generation call.
pub struct ModelPlanner {
    client: ResilientClient,
    model: String,
    tools: Vec<String>,
}

impl ModelPlanner {
    pub fn new(client: ResilientClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            tools: Vec::new(),
        }
    }

    /// Tool names offered to the planner.
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    fn prompt(&self, mission: &str, history: &[ConversationTurn]) -> String {
        let mut out = String::new();
        if !history.is_empty() {
            out.push_str("Conversation so far:\n");
            for turn in history {
                out.push_str(&format!("{}: {}\n", turn.role, turn.content));
            }
            out.push('\n');
        }
        if !self.tools.is_empty() {
            out.push_str(&format!("Available tools: {}\n\n", self.tools.join(", ")));
        }
        out.push_str("Mission: ");
        out.push_str(mission);
        out
    }
}

#[async_trait]
impl Planner for ModelPlanner {
    #[tracing::instrument(skip_all, fields(model = %self.model, history = history.len()))]
    async fn plan(
        &self,
        mission: &str,
        history: &[ConversationTurn],
    ) -> Result<MissionPlan, RemoteError> {
        let request = StructuredRequest {
            model: self.model.clone(),
            prompt: self.prompt(mission, history),
            system: Some(PLANNER_SYSTEM.to_string()),
            schema: Some(plan_schema()),
        };
        let plan: MissionPlan = self.client.generate_structured(&request).await?;
        tracing::info!(
            tasks = plan.tasks.len(),
            tools = plan.tools.len(),
            "mission planned"
        );
        Ok(plan)
    }
}

fn plan_schema() -> Value {
    json!({
        "type": "object",
        "required": ["tasks", "tools"],
        "properties": {
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "name", "description", "tools", "dependencies", "priority", "priorityReasoning"],
                    "properties": {
                        "id": {"type": "integer"},
                        "name": {"type": "string"},
                        "description": {"type": "string"},
                        "tools": {"type": "array", "items": {"type": "string"}},
                        "dependencies": {"type": "array", "items": {"type": "integer"}},
                        "priority": {"type": "string", "enum": ["High", "Medium", "Low"]},
                        "priorityReasoning": {"type": "string"}
                    }
                }
            },
            "tools": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "description"],
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"}
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::testing::{client, CannedBackend};
    use missionflow_core::api::Priority;
    use pretty_assertions::assert_eq;

    const PLAN_JSON: &str = r#"```json
{
  "tasks": [
    {"id": 1, "name": "Research", "description": "collect sources", "tools": ["search"],
     "dependencies": [], "priority": "High", "priorityReasoning": "everything builds on it"},
    {"id": 2, "name": "Draft", "description": "write it up", "tools": [],
     "dependencies": [1], "priority": "low", "priorityReasoning": "last step"}
  ],
  "tools": [{"name": "search", "description": "web search"}]
}
```"#;

    #[tokio::test]
    async fn parses_fenced_plan() {
        let backend = CannedBackend::new(vec![Ok(PLAN_JSON.to_string())]);
        let planner = ModelPlanner::new(client(backend.clone()), "planner-model")
            .with_tools(["search", "calculator"]);
        let history = vec![ConversationTurn {
            role: "user".to_string(),
            content: "keep it short".to_string(),
        }];

        let plan = planner.plan("write a report", &history).await.unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].priority, Priority::High);
        assert_eq!(plan.tasks[1].dependencies.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(plan.tools[0].name, "search");

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.model, "planner-model");
        assert!(req.prompt.contains("user: keep it short"));
        assert!(req.prompt.contains("Available tools: search, calculator"));
        assert!(req.prompt.ends_with("Mission: write a report"));
        assert!(req.schema.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_plan_is_not_retried() {
        let backend = CannedBackend::new(vec![
            Ok("here is your plan!".to_string()),
            Ok(PLAN_JSON.to_string()),
        ]);
        let planner = ModelPlanner::new(client(backend.clone()), "m");

        let err = planner.plan("m", &[]).await.unwrap_err();
        assert!(matches!(err, RemoteError::Malformed { .. }));
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried() {
        let backend = CannedBackend::new(vec![
            Err(RemoteError::from_message("HTTP 429: rate limit")),
            Ok(PLAN_JSON.to_string()),
        ]);
        let planner = ModelPlanner::new(client(backend.clone()), "m");

        let plan = planner.plan("m", &[]).await.unwrap();
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(backend.requests().len(), 2);
    }
}
