//! Dependency-aware mission execution.
//!
//! # Architecture
//!
//! ```text
//! MissionPlan (from the planner)
//!   ↓
//! Scheduler::launch() → TaskGraph + ResultStore + MissionLoop (spawned)
//!   ↓
//! MissionLoop::step()  → runnable = Pending ∧ ¬running ∧ deps ⊆ Success
//!   ↓                      (full rescan after every completion / command)
//! TaskExecutor::execute() × ready layer, unbounded fan-out
//!   ↓
//! ResilientClient::stream() → fragments appended via ResultStore::update()
//!   ↓
//! MissionOutcome::{Completed, Deadlocked} → SummaryInput (summarizer)
//! ```
//!
//! Retry is a state reset processed by the loop itself: a single task
//! cascades to its transitive dependents, "retry failed" resets Error tasks
//! only.

mod events;
mod graph;
mod prompt;
mod scheduler;
mod store;
mod summary;
mod task_executor;
pub mod traits;
pub mod types;

pub use events::MissionEvent;
pub use graph::{GraphDiagnostics, TaskGraph};
pub use prompt::{build_execution_prompt, truncate_chars, DependencyOutput};
pub use scheduler::{MissionHandle, MissionOutcome, Scheduler};
pub use store::ResultStore;
pub use summary::{ResultDigest, SummaryInput};
pub use task_executor::TaskExecutor;
pub use types::{MissionPlan, Priority, Task, TaskId, TaskResult, TaskStatus, ToolSpec};
