use async_trait::async_trait;

use missionflow_core::api::{
    RemoteError, ResilientClient, StructuredRequest, Summarizer, SummaryInput, TaskStatus,
};

const SUMMARIZER_SYSTEM: &str = "You write the final report of a multi-step mission. \
Summarize what was achieved, call out failed steps and their errors, and mention which \
tools were used. Be concise.";

/// Summarizer backed by a single-shot text generation.
pub struct ModelSummarizer {
    client: ResilientClient,
    model: String,
}

impl ModelSummarizer {
    pub fn new(client: ResilientClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

fn render_input(objective: &str, input: &SummaryInput) -> String {
    let mut out = format!(
        "Objective: {objective}\n\nResults ({} succeeded, {} failed, {} pending):\n",
        input.count(TaskStatus::Success),
        input.count(TaskStatus::Error),
        input.count(TaskStatus::Pending),
    );
    for r in &input.results {
        out.push_str(&format!("\n[{}] {:?}\n", r.id, r.status));
        if !r.content.is_empty() {
            out.push_str(&r.content);
            out.push('\n');
        }
        if let Some(err) = &r.error {
            out.push_str(&format!("error: {err}\n"));
        }
    }
    if !input.tool_usage.is_empty() {
        out.push_str("\nTool usage:\n");
        for (tool, count) in &input.tool_usage {
            out.push_str(&format!("- {tool}: {count}\n"));
        }
    }
    out
}

#[async_trait]
impl Summarizer for ModelSummarizer {
    #[tracing::instrument(skip_all, fields(model = %self.model, results = input.results.len()))]
    async fn summarize(
        &self,
        objective: &str,
        input: &SummaryInput,
    ) -> Result<String, RemoteError> {
        let request = StructuredRequest {
            model: self.model.clone(),
            prompt: render_input(objective, input),
            system: Some(SUMMARIZER_SYSTEM.to_string()),
            schema: None,
        };
        let report = self.client.generate_text(&request).await?;
        Ok(report.trim().to_string())
    }
}
