//! Remote generation calls and the retry/backoff layer around them.
//!
//! ```text
//! GenerationBackend (plugins: HTTP, tests: scripted)
//!   ↓
//! ResilientClient::stream()              → AttemptStarted / Text / AttemptFailed ...
//! ResilientClient::generate_structured() → T (code fence stripped, parsed)
//!   ↑
//! RetryStrategy (ExponentialBackoff: initial * 2^(n-1) + jitter)
//! ```

mod fence;
mod resilient;
mod retry;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::RemoteError;

pub use fence::strip_code_fence;
pub use resilient::{ResilientClient, StreamItem};
pub use retry::{ExponentialBackoff, RetryStrategy};

/// Lazy, finite, non-restartable sequence of text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, RemoteError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub model: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    /// Response schema, enforced by the endpoint.
    pub schema: Option<serde_json::Value>,
}

/// Remote text-generation endpoint.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Start a streaming generation.
    async fn stream(&self, request: &StreamRequest) -> Result<TextStream, RemoteError>;

    /// Single-shot generation returning one text blob.
    async fn generate(&self, request: &StructuredRequest) -> Result<String, RemoteError>;
}
