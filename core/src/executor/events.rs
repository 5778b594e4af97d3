use serde::Serialize;

use super::types::{TaskId, TaskStatus};

/// Observable mission events (consumed by UIs and loggers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionEvent {
    TaskStarted {
        id: TaskId,
        tool: Option<String>,
    },
    Fragment {
        id: TaskId,
        text: String,
    },
    AttemptFailed {
        id: TaskId,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    AttemptRestarted {
        id: TaskId,
        attempt: u32,
    },
    TaskFinished {
        id: TaskId,
        status: TaskStatus,
    },
    TasksReset {
        ids: Vec<TaskId>,
    },
    Completed,
    Deadlocked {
        ids: Vec<TaskId>,
    },
}
