//! Stable re-exports for consumers (`plugins` and external crates).
//!
//! Prefer importing from `missionflow_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, load_from_path, AppConfig, ExecutorConfig, LoggingConfig, RemoteConfig,
    RetryConfig,
};
pub use crate::error::{ErrorCode, MissionError, RemoteError, TaskError, DEADLOCK_MESSAGE};
pub use crate::executor::traits::{
    ConversationTurn, NoToolSelector, Planner, RandomToolSelector, Summarizer, ToolSelector,
};
pub use crate::executor::{
    MissionEvent, MissionHandle, MissionOutcome, MissionPlan, Priority, ResultStore, Scheduler,
    SummaryInput, Task, TaskExecutor, TaskGraph, TaskId, TaskResult, TaskStatus, ToolSpec,
};
pub use crate::logging::init_tracing;
pub use crate::remote::{
    strip_code_fence, ExponentialBackoff, GenerationBackend, ResilientClient, RetryStrategy,
    StreamItem, StreamRequest, StructuredRequest, TextStream,
};
