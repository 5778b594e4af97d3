use std::sync::Arc;

use anyhow::Result;

use missionflow_core::api::{
    AppConfig, ExecutorConfig, ExponentialBackoff, GenerationBackend, NoToolSelector,
    RandomToolSelector, RemoteConfig, ResilientClient, Scheduler, TaskExecutor, ToolSelector,
};

use crate::backend::HttpGenerationBackend;
use crate::collaborators::{ModelPlanner, ModelSummarizer};

pub fn build_backend(cfg: &RemoteConfig) -> Result<Arc<dyn GenerationBackend>> {
    let endpoint = cfg.endpoint.trim();
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        anyhow::bail!("remote.endpoint must be an http(s) url, got {:?}", cfg.endpoint);
    }
    Ok(Arc::new(HttpGenerationBackend::new(
        endpoint,
        cfg.resolved_api_key(),
    )?))
}

pub fn build_tool_selector(cfg: &ExecutorConfig) -> Arc<dyn ToolSelector> {
    if cfg.simulate_tools {
        Arc::new(RandomToolSelector)
    } else {
        Arc::new(NoToolSelector)
    }
}

/// Backend wrapped in the configured retry policy and attempt timeout.
pub fn build_client(cfg: &AppConfig) -> Result<ResilientClient> {
    let backend = build_backend(&cfg.remote)?;
    let strategy = Arc::new(ExponentialBackoff::new(cfg.retry.clone()));
    Ok(ResilientClient::new(backend, strategy).with_attempt_timeout(cfg.remote.attempt_timeout()))
}

pub fn build_scheduler(cfg: &AppConfig) -> Result<Scheduler> {
    let executor = TaskExecutor::with_config(
        build_client(cfg)?,
        cfg.remote.model.clone(),
        cfg.executor.clone(),
    )
    .tool_selector(build_tool_selector(&cfg.executor));
    Ok(Scheduler::new(executor))
}

pub fn build_planner(cfg: &AppConfig) -> Result<ModelPlanner> {
    Ok(ModelPlanner::new(build_client(cfg)?, cfg.remote.model.clone()))
}

pub fn build_summarizer(cfg: &AppConfig) -> Result<ModelSummarizer> {
    Ok(ModelSummarizer::new(build_client(cfg)?, cfg.remote.model.clone()))
}
