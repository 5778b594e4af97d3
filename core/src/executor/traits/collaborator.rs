use async_trait::async_trait;

use crate::error::RemoteError;
use crate::executor::summary::SummaryInput;
use crate::executor::types::MissionPlan;

/// Prior exchange handed to the planner alongside the mission text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// Upstream collaborator producing the task graph for a mission.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        mission: &str,
        history: &[ConversationTurn],
    ) -> Result<MissionPlan, RemoteError>;
}

/// Downstream collaborator producing the end-of-mission report.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, objective: &str, input: &SummaryInput)
        -> Result<String, RemoteError>;
}
