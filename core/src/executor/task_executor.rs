use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::error::{RemoteError, TaskError};
use crate::remote::{ResilientClient, StreamItem, StreamRequest};

use super::events::MissionEvent;
use super::graph::TaskGraph;
use super::prompt::{build_execution_prompt, DependencyOutput};
use super::store::ResultStore;
use super::traits::{NoToolSelector, RandomToolSelector, ToolSelector};
use super::types::{Task, TaskResult, TaskStatus};

/// Drives one task's remote call and records everything on its result.
pub struct TaskExecutor {
    client: ResilientClient,
    model: String,
    tool_selector: Arc<dyn ToolSelector>,
    config: ExecutorConfig,
}

impl TaskExecutor {
    pub fn new(client: ResilientClient, model: impl Into<String>) -> Self {
        Self::with_config(client, model, ExecutorConfig::default())
    }

    pub fn with_config(
        client: ResilientClient,
        model: impl Into<String>,
        config: ExecutorConfig,
    ) -> Self {
        let tool_selector: Arc<dyn ToolSelector> = if config.simulate_tools {
            Arc::new(RandomToolSelector)
        } else {
            Arc::new(NoToolSelector)
        };
        Self {
            client,
            model: model.into(),
            tool_selector,
            config,
        }
    }

    pub fn tool_selector(mut self, selector: Arc<dyn ToolSelector>) -> Self {
        self.tool_selector = selector;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `task` to a terminal status. Never fails: the outcome, including
    /// permanent remote failure, is recorded on the task's result.
    #[tracing::instrument(skip_all, fields(task_id = task.id, task = %task.name))]
    pub async fn execute(
        &self,
        task: &Task,
        objective: &str,
        graph: &TaskGraph,
        store: &ResultStore,
    ) -> TaskStatus {
        let prompt = self.compose_prompt(task, objective, graph, store);

        let tool = if task.tools.is_empty() {
            None
        } else {
            self.tool_selector.select(&task.tools)
        };

        store.update(task.id, |r| {
            r.active_tool = tool.clone();
            r.started_at = Some(Utc::now());
        });
        store.publish(MissionEvent::TaskStarted {
            id: task.id,
            tool: tool.clone(),
        });
        info!(tool = ?tool, "task started");

        let outcome = self.stream_into(task, prompt, store).await;

        let status = store
            .update(task.id, |r| {
                match &outcome {
                    Ok(()) => r.succeed(),
                    Err(e) => r.fail(TaskError::from(e)),
                }
                r.tool_used = tool.clone();
                r.status
            })
            .unwrap_or(TaskStatus::Error);

        match &outcome {
            Ok(()) => info!("task succeeded"),
            Err(e) => warn!(error = %e, "task failed"),
        }
        store.publish(MissionEvent::TaskFinished {
            id: task.id,
            status,
        });
        status
    }

    async fn stream_into(
        &self,
        task: &Task,
        prompt: String,
        store: &ResultStore,
    ) -> Result<(), RemoteError> {
        let request = StreamRequest {
            model: self.model.clone(),
            prompt,
        };
        let mut items = self.client.stream(request);

        while let Some(item) = items.next().await {
            match item? {
                StreamItem::AttemptStarted { attempt } => {
                    // Text from a failed attempt never survives into the next.
                    store.update(task.id, |r| {
                        r.attempts = attempt;
                        if attempt > 1 {
                            r.content.clear();
                        }
                    });
                    if attempt > 1 {
                        store.publish(MissionEvent::AttemptRestarted {
                            id: task.id,
                            attempt,
                        });
                    }
                }
                StreamItem::Text(text) => {
                    store.update(task.id, |r| r.content.push_str(&text));
                    store.publish(MissionEvent::Fragment { id: task.id, text });
                }
                StreamItem::AttemptFailed {
                    attempt,
                    error,
                    retry_in,
                } => {
                    debug!(attempt, error = %error, "attempt failed");
                    store.publish(MissionEvent::AttemptFailed {
                        id: task.id,
                        attempt,
                        delay_ms: retry_in.as_millis() as u64,
                        error: error.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn compose_prompt(
        &self,
        task: &Task,
        objective: &str,
        graph: &TaskGraph,
        store: &ResultStore,
    ) -> String {
        let dep_results: Vec<(&Task, TaskResult)> = if self.config.include_dependency_outputs {
            task.dependencies
                .iter()
                .filter_map(|id| Some((graph.get(*id)?, store.get(*id)?)))
                .collect()
        } else {
            Vec::new()
        };

        let deps: Vec<DependencyOutput<'_>> = dep_results
            .iter()
            .map(|(dep_task, result)| DependencyOutput {
                task: *dep_task,
                result,
            })
            .collect();

        build_execution_prompt(objective, task, &deps, self.config.dependency_output_chars)
    }
}
