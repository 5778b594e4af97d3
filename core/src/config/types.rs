use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default)]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "missionflow_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: false,
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Remote generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: String,

    /// Env var consulted when `api_key` is empty.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-attempt timeout; unset means attempts are unbounded.
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/v1/generate".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_api_key_env() -> String {
    "MISSIONFLOW_API_KEY".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: String::new(),
            api_key_env: default_api_key_env(),
            attempt_timeout_ms: None,
        }
    }
}

impl RemoteConfig {
    /// Configured key, falling back to `api_key_env`.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per logical call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_jitter_max_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Mark a randomly chosen declared tool as active while a task runs.
    #[serde(default = "default_true")]
    pub simulate_tools: bool,

    /// Feed completed dependencies' output into the execution prompt.
    #[serde(default = "default_true")]
    pub include_dependency_outputs: bool,

    #[serde(default = "default_dependency_output_chars")]
    pub dependency_output_chars: usize,

    /// Per-task content preview handed to the summarizer.
    #[serde(default = "default_summary_preview_chars")]
    pub summary_preview_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_dependency_output_chars() -> usize {
    2000
}

fn default_summary_preview_chars() -> usize {
    500
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            simulate_tools: true,
            include_dependency_outputs: true,
            dependency_output_chars: default_dependency_output_chars(),
            summary_preview_chars: default_summary_preview_chars(),
        }
    }
}
