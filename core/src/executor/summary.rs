use std::collections::BTreeMap;

use serde::Serialize;

use super::prompt::truncate_chars;
use super::types::{TaskId, TaskResult, TaskStatus};

/// Per-task digest handed to the summarizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultDigest {
    pub id: TaskId,
    pub status: TaskStatus,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything the summarizer consumes once a mission settles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryInput {
    pub results: Vec<ResultDigest>,
    /// Number of tasks that recorded each tool as used.
    pub tool_usage: BTreeMap<String, usize>,
}

impl SummaryInput {
    pub fn from_results(results: &[TaskResult], preview_chars: usize) -> Self {
        let mut tool_usage = BTreeMap::new();
        for tool in results.iter().filter_map(|r| r.tool_used.as_ref()) {
            *tool_usage.entry(tool.clone()).or_insert(0) += 1;
        }

        let digests = results
            .iter()
            .map(|r| ResultDigest {
                id: r.id,
                status: r.status,
                content: truncate_chars(&r.content, preview_chars),
                error: r.error.as_ref().map(|e| e.message.clone()),
            })
            .collect();

        Self {
            results: digests,
            tool_usage,
        }
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}
