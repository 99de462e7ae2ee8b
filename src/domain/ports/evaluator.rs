//! Automated evaluator port.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluator API key is not configured")]
    MissingApiKey,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API key - authentication failed")]
    InvalidApiKey,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded - too many requests")]
    RateLimitExceeded,

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Unexpected evaluator response: {0}")]
    InvalidResponse(String),
}

/// External scorer that answers a rubric prompt with text.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Model identifier recorded on judge results.
    fn model(&self) -> &str;

    /// Send `system` and `user` prompts and return the raw text answer.
    async fn evaluate(&self, system: &str, user: &str) -> Result<String, EvaluatorError>;
}
