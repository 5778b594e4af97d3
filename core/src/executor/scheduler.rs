use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{MissionError, TaskError};

use super::events::MissionEvent;
use super::graph::{format_path, TaskGraph};
use super::store::ResultStore;
use super::summary::SummaryInput;
use super::task_executor::TaskExecutor;
use super::types::{MissionPlan, Task, TaskId, TaskResult, TaskStatus};

/// How a mission settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissionOutcome {
    /// Every task reached Success or Error.
    Completed { results: Vec<TaskResult> },
    /// Remaining Pending tasks could never run and were force-failed.
    Deadlocked {
        error: MissionError,
        results: Vec<TaskResult>,
    },
}

impl MissionOutcome {
    pub fn results(&self) -> &[TaskResult] {
        match self {
            Self::Completed { results } | Self::Deadlocked { results, .. } => results,
        }
    }

    pub fn error(&self) -> Option<&MissionError> {
        match self {
            Self::Completed { .. } => None,
            Self::Deadlocked { error, .. } => Some(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn summary_input(&self, preview_chars: usize) -> SummaryInput {
        SummaryInput::from_results(self.results(), preview_chars)
    }
}

enum Command {
    RetryTask {
        id: TaskId,
        reply: oneshot::Sender<Result<Vec<TaskId>, MissionError>>,
    },
    RetryFailed {
        reply: oneshot::Sender<Result<Vec<TaskId>, MissionError>>,
    },
    Shutdown,
}

/// Launches missions onto the tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    executor: Arc<TaskExecutor>,
}

impl Scheduler {
    pub fn new(executor: TaskExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Start the dispatch loop for `plan`. Must be called inside a tokio
    /// runtime.
    pub fn launch(
        &self,
        plan: &MissionPlan,
        objective: impl Into<String>,
    ) -> Result<MissionHandle, MissionError> {
        let graph = Arc::new(TaskGraph::from_tasks(&plan.tasks)?);
        let store = Arc::new(ResultStore::new(graph.ids().iter().copied()));
        let mission_id = Uuid::new_v4();
        let objective: String = objective.into();

        let diagnostics = graph.diagnose();
        for (task, dep) in &diagnostics.missing {
            warn!(%mission_id, task, missing = dep, "task depends on an unknown id");
        }
        if let Some(cycle) = &diagnostics.cycle {
            warn!(%mission_id, cycle = %format_path(cycle), "dependency cycle in task graph");
        }
        info!(
            %mission_id,
            tasks = graph.len(),
            layers = ?graph.planned_layers(),
            "mission launched"
        );

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (outcome_tx, outcome_rx) = watch::channel(None);

        let mission = MissionLoop {
            graph: graph.clone(),
            store: store.clone(),
            executor: self.executor.clone(),
            objective: Arc::from(objective),
            running: HashSet::new(),
            inflight: JoinSet::new(),
            settled: false,
            outcome_tx,
        };
        let join = tokio::spawn(
            mission
                .run(cmd_rx)
                .instrument(info_span!("mission", id = %mission_id)),
        );

        Ok(MissionHandle {
            mission_id,
            commands: cmd_tx,
            store,
            graph,
            outcome: outcome_rx,
            join: Some(join),
        })
    }
}

/// Control surface of one running mission.
pub struct MissionHandle {
    mission_id: Uuid,
    commands: mpsc::Sender<Command>,
    store: Arc<ResultStore>,
    graph: Arc<TaskGraph>,
    outcome: watch::Receiver<Option<MissionOutcome>>,
    join: Option<JoinHandle<()>>,
}

impl MissionHandle {
    pub fn mission_id(&self) -> Uuid {
        self.mission_id
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.tasks()
    }

    pub fn results(&self) -> Vec<TaskResult> {
        self.store.snapshot()
    }

    pub fn result(&self, id: TaskId) -> Option<TaskResult> {
        self.store.get(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MissionEvent> {
        self.store.subscribe()
    }

    /// Reset `id` and everything depending on it, then resume dispatch.
    /// Returns the reset ids.
    pub async fn retry_task(&self, id: TaskId) -> Result<Vec<TaskId>, MissionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RetryTask { id, reply }).await?;
        rx.await.map_err(|_| MissionError::Closed)?
    }

    /// Reset every Error task (no cascade), then resume dispatch.
    pub async fn retry_failed(&self) -> Result<Vec<TaskId>, MissionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RetryFailed { reply }).await?;
        rx.await.map_err(|_| MissionError::Closed)?
    }

    /// Wait until the mission completes or deadlocks. Returns immediately if
    /// it already has and no retry re-armed it since.
    pub async fn settled(&self) -> Result<MissionOutcome, MissionError> {
        let mut rx = self.outcome.clone();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return Ok(outcome);
            }
            rx.changed().await.map_err(|_| MissionError::Closed)?;
        }
    }

    /// Stop the loop and abort in-flight executors.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    async fn send(&self, cmd: Command) -> Result<(), MissionError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| MissionError::Closed)
    }
}

/// Owns `running` and the in-flight executors. Every decision is a full
/// rescan of the graph against the store, redone after each completion and
/// each command.
struct MissionLoop {
    graph: Arc<TaskGraph>,
    store: Arc<ResultStore>,
    executor: Arc<TaskExecutor>,
    objective: Arc<str>,
    running: HashSet<TaskId>,
    inflight: JoinSet<(TaskId, Option<TaskStatus>)>,
    settled: bool,
    outcome_tx: watch::Sender<Option<MissionOutcome>>,
}

impl MissionLoop {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut commands_open = true;

        loop {
            self.step();

            if !commands_open && self.inflight.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    match joined {
                        Ok((id, status)) => self.on_finished(id, status),
                        Err(e) => warn!(error = %e, "executor task did not complete"),
                    }
                }
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(Command::Shutdown) => break,
                    Some(cmd) => self.on_command(cmd),
                    None => commands_open = false,
                },
            }
        }

        self.inflight.abort_all();
        debug!("mission loop stopped");
    }

    /// Dispatch the ready layer, then check for completion or deadlock.
    fn step(&mut self) {
        for task in self.runnable() {
            self.dispatch(task);
        }

        if !self.running.is_empty() {
            return;
        }

        let pending = self.store.ids_with_status(TaskStatus::Pending);
        if pending.is_empty() {
            if !self.settled {
                self.complete();
            }
            return;
        }

        // Nothing running, nothing runnable, yet work remains.
        self.resolve_deadlock(pending);
    }

    fn runnable(&self) -> Vec<Task> {
        self.graph
            .tasks()
            .filter(|task| {
                !self.running.contains(&task.id)
                    && self.store.status(task.id) == Some(TaskStatus::Pending)
                    && task
                        .dependencies
                        .iter()
                        .all(|dep| self.store.status(*dep) == Some(TaskStatus::Success))
            })
            .cloned()
            .collect()
    }

    fn dispatch(&mut self, task: Task) {
        debug!(task_id = task.id, "dispatching task");
        self.running.insert(task.id);

        let executor = self.executor.clone();
        let graph = self.graph.clone();
        let store = self.store.clone();
        let objective = self.objective.clone();
        let id = task.id;

        self.inflight.spawn(
            async move {
                let run = async { executor.execute(&task, &objective, &graph, &store).await };
                let status = AssertUnwindSafe(run).catch_unwind().await.ok();
                (id, status)
            }
            .in_current_span(),
        );
    }

    fn on_finished(&mut self, id: TaskId, status: Option<TaskStatus>) {
        self.running.remove(&id);
        if status.is_none() {
            warn!(task_id = id, "executor panicked");
            self.store.update(id, |r| {
                if r.status == TaskStatus::Pending {
                    r.fail(TaskError::internal("task executor panicked"));
                }
            });
            self.store.publish(MissionEvent::TaskFinished {
                id,
                status: TaskStatus::Error,
            });
        }
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::RetryTask { id, reply } => {
                let res = self.retry_task(id);
                let _ = reply.send(res);
            }
            Command::RetryFailed { reply } => {
                // An executor that recorded Error but has not been joined yet
                // still owns its entry.
                let ids: Vec<TaskId> = self
                    .store
                    .ids_with_status(TaskStatus::Error)
                    .into_iter()
                    .filter(|id| !self.running.contains(id))
                    .collect();
                self.reset(&ids);
                let _ = reply.send(Ok(ids));
            }
            Command::Shutdown => {}
        }
    }

    fn retry_task(&mut self, id: TaskId) -> Result<Vec<TaskId>, MissionError> {
        let status = self.store.status(id).ok_or(MissionError::UnknownTask(id))?;
        if self.running.contains(&id) || !status.is_terminal() {
            return Err(MissionError::RetryRejected {
                id,
                reason: "task has not reached a terminal state".to_string(),
            });
        }

        let closure: Vec<TaskId> = self.graph.dependents_closure(id).into_iter().collect();
        if let Some(busy) = closure.iter().find(|t| self.running.contains(t)) {
            return Err(MissionError::RetryRejected {
                id,
                reason: format!("dependent task {busy} is still running"),
            });
        }

        self.reset(&closure);
        Ok(closure)
    }

    fn reset(&mut self, ids: &[TaskId]) {
        if ids.is_empty() {
            return;
        }
        for id in ids {
            self.store.update(*id, |r| r.reset());
        }
        info!(ids = ?ids, "tasks reset for retry");
        self.store.publish(MissionEvent::TasksReset { ids: ids.to_vec() });
        self.settled = false;
        self.outcome_tx.send_replace(None);
    }

    fn complete(&mut self) {
        self.settled = true;
        let results = self.store.snapshot();
        let failed = results
            .iter()
            .filter(|r| r.status == TaskStatus::Error)
            .count();
        info!(total = results.len(), failed, "mission complete");
        self.store.publish(MissionEvent::Completed);
        self.outcome_tx
            .send_replace(Some(MissionOutcome::Completed { results }));
    }

    fn resolve_deadlock(&mut self, pending: Vec<TaskId>) {
        warn!(pending = ?pending, "dependency deadlock, failing remaining tasks");
        for id in &pending {
            self.store.update(*id, |r| {
                if r.status == TaskStatus::Pending {
                    r.fail(TaskError::deadlock());
                }
            });
            self.store.publish(MissionEvent::TaskFinished {
                id: *id,
                status: TaskStatus::Error,
            });
        }

        self.settled = true;
        self.store.publish(MissionEvent::Deadlocked {
            ids: pending.clone(),
        });
        self.outcome_tx.send_replace(Some(MissionOutcome::Deadlocked {
            error: MissionError::DependencyDeadlock { pending },
            results: self.store.snapshot(),
        }));
    }
}
