use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use super::code::ErrorCode;

lazy_static! {
    /// Messages matching this pattern describe a transient condition on the
    /// remote side (server unavailable, internal error, rate limiting).
    static ref TRANSIENT_PATTERN: Regex = Regex::new(
        r"(?i)\b(500|503|429)\b|\b(unavailable|internal)(_\w*)?\b|rate[ _-]?limit|too many requests|resource_exhausted|overloaded"
    )
    .expect("transient error pattern is valid");
}

/// Returns true when an error message indicates a retryable remote failure.
pub fn is_transient_message(message: &str) -> bool {
    TRANSIENT_PATTERN.is_match(message)
}

/// Failure of a single remote generation call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transient remote error: {0}")]
    Transient(String),

    #[error("remote error: {0}")]
    Fatal(String),

    #[error("malformed structured response: {message}")]
    Malformed { message: String, preview: String },

    #[error("remote attempt timed out after {0}ms")]
    Timeout(u64),
}

impl RemoteError {
    /// Classify a raw failure message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_transient_message(&message) {
            Self::Transient(message)
        } else {
            Self::Fatal(message)
        }
    }

    pub fn malformed(message: impl Into<String>, raw: &str) -> Self {
        const PREVIEW_LIMIT: usize = 256;
        let preview: String = raw.chars().take(PREVIEW_LIMIT).collect();
        Self::Malformed {
            message: message.into(),
            preview,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    /// Text without the classification prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Transient(m) | Self::Fatal(m) => m.clone(),
            Self::Malformed { message, .. } => message.clone(),
            Self::Timeout(ms) => format!("timed out after {ms}ms"),
        }
    }

    /// Extra detail worth keeping next to the message, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Malformed { preview, .. } if !preview.is_empty() => {
                Some(format!("response preview: {preview}"))
            }
            _ => None,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Transient(m) if m.contains("429") || m.to_lowercase().contains("rate") => {
                ErrorCode::QuotaExceeded
            }
            Self::Transient(_) => ErrorCode::NetworkError,
            Self::Fatal(_) => ErrorCode::BackendError,
            Self::Malformed { .. } => ErrorCode::ParseError,
            Self::Timeout(_) => ErrorCode::Timeout,
        }
    }
}
