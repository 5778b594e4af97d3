#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use missionflow_core::api::{
    ExecutorConfig, ExponentialBackoff, GenerationBackend, RemoteError, ResilientClient,
    RetryConfig, Scheduler, StreamRequest, StructuredRequest, TaskExecutor, TextStream,
    ToolSelector,
};

/// Scripted outcome of one streaming call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Vec<String>),
    /// The call fails before producing anything.
    Fail(String),
    /// Some fragments, then the stream errors.
    Partial(Vec<String>, String),
}

pub fn ok(fragments: &[&str]) -> Reply {
    Reply::Ok(fragments.iter().map(|s| s.to_string()).collect())
}

pub fn fail(message: &str) -> Reply {
    Reply::Fail(message.to_string())
}

pub fn partial(fragments: &[&str], message: &str) -> Reply {
    Reply::Partial(
        fragments.iter().map(|s| s.to_string()).collect(),
        message.to_string(),
    )
}

/// In-memory backend keyed by task name (taken from the execution prompt).
/// Unscripted calls succeed with a single `done: <name>` fragment.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    gates: Mutex<HashMap<String, Arc<Barrier>>>,
    calls: Mutex<Vec<(String, tokio::time::Instant)>>,
    prompts: Mutex<Vec<String>>,
    structured: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, task: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(task.to_string())
            .or_default()
            .extend(replies);
    }

    /// The first call for each named task waits on a shared barrier.
    pub fn gate(&self, tasks: &[&str]) {
        let barrier = Arc::new(Barrier::new(tasks.len()));
        let mut gates = self.gates.lock().unwrap();
        for task in tasks {
            gates.insert(task.to_string(), barrier.clone());
        }
    }

    pub fn push_structured(&self, reply: Result<&str, &str>) {
        self.structured
            .lock()
            .unwrap()
            .push_back(reply.map(str::to_string).map_err(str::to_string));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub fn call_count(&self, task: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == task).count()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub fn task_name(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|l| l.strip_prefix("Your task: "))
        .unwrap_or(prompt)
        .to_string()
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &StreamRequest) -> Result<TextStream, RemoteError> {
        let name = task_name(&request.prompt);
        self.calls
            .lock()
            .unwrap()
            .push((name.clone(), tokio::time::Instant::now()));
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let gate = self.gates.lock().unwrap().remove(&name);
        if let Some(gate) = gate {
            gate.wait().await;
        }

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Reply::Ok(vec![format!("done: {name}")]));

        let items: Vec<Result<String, RemoteError>> = match reply {
            Reply::Ok(fragments) => fragments.into_iter().map(Ok).collect(),
            Reply::Fail(message) => return Err(RemoteError::from_message(message)),
            Reply::Partial(fragments, message) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(RemoteError::from_message(message))))
                .collect(),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn generate(&self, _request: &StructuredRequest) -> Result<String, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(("<structured>".to_string(), tokio::time::Instant::now()));
        match self.structured.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(RemoteError::from_message(message)),
            None => Err(RemoteError::from_message("no scripted structured reply")),
        }
    }
}

/// Deterministic stand-in for the random tool choice.
pub struct FirstToolSelector;

impl ToolSelector for FirstToolSelector {
    fn name(&self) -> &str {
        "first"
    }

    fn select(&self, tools: &BTreeSet<String>) -> Option<String> {
        tools.iter().next().cloned()
    }
}

pub fn retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 5,
        initial_delay_ms: 1000,
        jitter_max_ms: 1000,
    }
}

pub fn client(backend: Arc<ScriptedBackend>, retry: RetryConfig) -> ResilientClient {
    ResilientClient::new(backend, Arc::new(ExponentialBackoff::new(retry)))
}

pub fn scheduler(backend: Arc<ScriptedBackend>) -> Scheduler {
    let executor = TaskExecutor::with_config(
        client(backend, retry_config()),
        "test-model",
        ExecutorConfig::default(),
    )
    .tool_selector(Arc::new(FirstToolSelector));
    Scheduler::new(executor)
}

pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(600);
