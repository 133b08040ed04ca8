//! Vision model provider abstractions and implementations.
//!
//! The handler depends only on [`ClientFactory`] and [`VisionClient`], so the
//! Gemini backend can be swapped for the mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// MIME type attached to every uploaded image.
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// Failure to produce a usable client. Never involves network I/O.
#[derive(Error, Debug)]
pub enum ClientSetupError {
    #[error("GEMINI_API_KEY environment variable not set")]
    MissingCredential,

    #[error("failed to initialize client: {0}")]
    Initialization(String),
}

/// Categorized failure of a generation call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("authentication rejected: {0}")]
    Unauthenticated(String),

    #[error("quota exhausted: {message}")]
    QuotaExhausted {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("request rejected: {0}")]
    InvalidRequest(String),

    #[error("upstream timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Whether the same request could succeed if sent again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::QuotaExhausted { .. }
            | GenerationError::Timeout
            | GenerationError::Transport(_) => true,
            GenerationError::Upstream { status, .. } => *status >= 500,
            GenerationError::Unauthenticated(_)
            | GenerationError::InvalidRequest(_)
            | GenerationError::MalformedResponse(_) => false,
        }
    }

    /// Short category name, surfaced to callers as error details.
    pub fn category(&self) -> &'static str {
        match self {
            GenerationError::Unauthenticated(_) => "authentication rejected",
            GenerationError::QuotaExhausted { .. } => "quota exhausted",
            GenerationError::InvalidRequest(_) => "request rejected by model",
            GenerationError::Timeout => "upstream timed out",
            GenerationError::Transport(_) => "transport failure",
            GenerationError::Upstream { .. } => "upstream error",
            GenerationError::MalformedResponse(_) => "malformed upstream response",
        }
    }
}

/// One ordered piece of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    InlineData { mime_type: String, data: Vec<u8> },
    Text(String),
}

impl Part {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Part::InlineData {
            mime_type: JPEG_MIME_TYPE.to_string(),
            data,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }
}

/// Upstream response, relayed to the caller without reinterpretation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GenerationResult(pub serde_json::Value);

/// A client bound to one credential.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Submit `parts`, in order, to `model` and wait for the full response.
    async fn generate_content(
        &self,
        model: &str,
        parts: &[Part],
    ) -> Result<GenerationResult, GenerationError>;
}

/// Produces clients for the analysis handler.
pub trait ClientFactory: Send + Sync {
    fn acquire_client(&self) -> Result<Arc<dyn VisionClient>, ClientSetupError>;

    /// Whether a credential is present; used by the health endpoint.
    fn has_credential(&self) -> bool;
}
