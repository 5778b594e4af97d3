use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::RemoteError;

use super::fence::strip_code_fence;
use super::retry::RetryStrategy;
use super::{GenerationBackend, StreamRequest, StructuredRequest, TextStream};

/// Items of a resilient stream, in order. A retried call restarts from
/// scratch, so consumers drop text seen before the latest `AttemptStarted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    AttemptStarted {
        attempt: u32,
    },
    Text(String),
    AttemptFailed {
        attempt: u32,
        error: RemoteError,
        retry_in: Duration,
    },
}

/// Retry/backoff wrapper around one logical remote call.
#[derive(Clone)]
pub struct ResilientClient {
    backend: Arc<dyn GenerationBackend>,
    strategy: Arc<dyn RetryStrategy>,
    attempt_timeout: Option<Duration>,
}

impl ResilientClient {
    pub fn new(backend: Arc<dyn GenerationBackend>, strategy: Arc<dyn RetryStrategy>) -> Self {
        Self {
            backend,
            strategy,
            attempt_timeout: None,
        }
    }

    /// Bound how long one attempt may take to open its stream or return its
    /// blob. Unset by default.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Streaming call. Ends after the first fully successful attempt, or with
    /// one `Err` carrying the last error once retries are exhausted or the
    /// failure is not retryable.
    pub fn stream(&self, request: StreamRequest) -> BoxStream<'static, Result<StreamItem, RemoteError>> {
        let backend = self.backend.clone();
        let strategy = self.strategy.clone();
        let timeout = self.attempt_timeout;

        Box::pin(async_stream::stream! {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                yield Ok(StreamItem::AttemptStarted { attempt });

                let opened: Result<TextStream, RemoteError> =
                    within(timeout, backend.stream(&request)).await;
                let error = match opened {
                    Ok(mut fragments) => {
                        let mut failure = None;
                        while let Some(fragment) = fragments.next().await {
                            match fragment {
                                Ok(text) => yield Ok(StreamItem::Text(text)),
                                Err(e) => {
                                    failure = Some(e);
                                    break;
                                }
                            }
                        }
                        match failure {
                            None => {
                                debug!(attempt, "remote stream completed");
                                return;
                            }
                            Some(e) => e,
                        }
                    }
                    Err(e) => e,
                };

                match retry_delay(strategy.as_ref(), attempt, &error) {
                    Some(delay) => {
                        yield Ok(StreamItem::AttemptFailed {
                            attempt,
                            error: error.clone(),
                            retry_in: delay,
                        });
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        yield Err(error);
                        return;
                    }
                }
            }
        })
    }

    /// Single-shot call returning the raw text blob.
    pub async fn generate_text(&self, request: &StructuredRequest) -> Result<String, RemoteError> {
        self.with_retry(move || async move {
            within(self.attempt_timeout, self.backend.generate(request)).await
        })
        .await
    }

    /// Single-shot call parsed as a structured document. Parse failures are
    /// `Malformed`, which the default strategy treats as fatal.
    pub async fn generate_structured<T: DeserializeOwned>(
        &self,
        request: &StructuredRequest,
    ) -> Result<T, RemoteError> {
        self.with_retry(move || async move {
            let raw = within(self.attempt_timeout, self.backend.generate(request)).await?;
            let body = strip_code_fence(&raw);
            serde_json::from_str::<T>(body).map_err(|e| RemoteError::malformed(e.to_string(), body))
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            match retry_delay(self.strategy.as_ref(), attempt, &error) {
                Some(delay) => tokio::time::sleep(delay).await,
                None => return Err(error),
            }
        }
    }
}

/// Delay before the next attempt, or `None` when the failure is final.
fn retry_delay(strategy: &dyn RetryStrategy, attempt: u32, error: &RemoteError) -> Option<Duration> {
    if !strategy.should_retry(attempt, error) {
        warn!(
            attempt,
            retryable = error.is_retryable(),
            error = %error,
            "remote call failed permanently"
        );
        return None;
    }
    let delay = strategy.next_delay(attempt, error)?;
    warn!(
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "remote call failed, retrying"
    );
    Some(delay)
}

async fn within<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    match timeout {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(RemoteError::Timeout(limit.as_millis() as u64)),
        },
    }
}
