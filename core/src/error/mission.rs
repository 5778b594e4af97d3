use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::code::ErrorCode;
use super::remote::RemoteError;
use crate::executor::types::TaskId;

/// Message applied to every task force-failed by deadlock resolution.
pub const DEADLOCK_MESSAGE: &str =
    "Deadlock: this task's dependencies can never succeed, so it was not run";

/// Mission-scoped errors raised by the scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MissionError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(TaskId),

    #[error("Task not found: {0}")]
    UnknownTask(TaskId),

    #[error("Retry rejected for task {id}: {reason}")]
    RetryRejected { id: TaskId, reason: String },

    #[error("Dependency deadlock: {} pending task(s) can never run ({})", .pending.len(), format_ids(.pending))]
    DependencyDeadlock { pending: Vec<TaskId> },

    #[error("Mission scheduler is no longer running")]
    Closed,
}

impl MissionError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateTaskId(_) => ErrorCode::ValidationError,
            Self::UnknownTask(_) => ErrorCode::TaskNotFound,
            Self::RetryRejected { .. } => ErrorCode::RetryRejected,
            Self::DependencyDeadlock { .. } => ErrorCode::Deadlock,
            Self::Closed => ErrorCode::GeneralError,
        }
    }
}

fn format_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Terminal failure recorded on a single task result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub code: u16,
}

impl TaskError {
    pub fn deadlock() -> Self {
        Self {
            message: DEADLOCK_MESSAGE.to_string(),
            detail: None,
            code: ErrorCode::Deadlock.as_u16(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
            code: ErrorCode::GeneralError.as_u16(),
        }
    }

    pub fn is_deadlock(&self) -> bool {
        self.code == ErrorCode::Deadlock.as_u16()
    }
}

impl From<&RemoteError> for TaskError {
    fn from(err: &RemoteError) -> Self {
        Self {
            message: err.to_string(),
            detail: err.detail(),
            code: err.error_code().as_u16(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadlock_error_lists_pending_ids() {
        let err = MissionError::DependencyDeadlock {
            pending: vec![4, 7],
        };
        assert_eq!(
            err.to_string(),
            "Dependency deadlock: 2 pending task(s) can never run (4, 7)"
        );
        assert_eq!(err.error_code(), ErrorCode::Deadlock);
    }

    #[test]
    fn task_error_from_remote_keeps_detail() {
        let remote = RemoteError::malformed("bad json", "{oops");
        let err = TaskError::from(&remote);
        assert!(err.message.contains("bad json"));
        assert_eq!(err.code, ErrorCode::ParseError.as_u16());
        assert!(err.detail.unwrap().contains("{oops"));
    }
}
