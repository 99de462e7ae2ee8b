//! Anthropic Messages API evaluator.
//!
//! One non-streaming `POST /v1/messages` per evaluation, temperature 0.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::JudgeConfig;
use crate::domain::ports::{Evaluator, EvaluatorError};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key; `ANTHROPIC_API_KEY` is consulted when unset.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub api_version: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl AnthropicConfig {
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
    }
}

impl From<&JudgeConfig> for AnthropicConfig {
    fn from(config: &JudgeConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_version: API_VERSION.to_string(),
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

pub struct AnthropicEvaluator {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicEvaluator {
    pub fn new(config: AnthropicConfig) -> Result<Self, EvaluatorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvaluatorError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn from_config(config: &JudgeConfig) -> Result<Self, EvaluatorError> {
        Self::new(AnthropicConfig::from(config))
    }

    async fn error_for(response: Response) -> EvaluatorError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());

        warn!(status = %status, "Evaluator API error");

        match status {
            StatusCode::BAD_REQUEST => EvaluatorError::InvalidRequest(body),
            StatusCode::UNAUTHORIZED => EvaluatorError::InvalidApiKey,
            StatusCode::FORBIDDEN => EvaluatorError::Forbidden(body),
            StatusCode::TOO_MANY_REQUESTS => EvaluatorError::RateLimitExceeded,
            status => EvaluatorError::ServerError(status.as_u16(), body),
        }
    }
}

impl From<reqwest::Error> for EvaluatorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Evaluator for AnthropicEvaluator {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn evaluate(&self, system: &str, user: &str) -> Result<String, EvaluatorError> {
        let api_key = self.config.get_api_key().ok_or(EvaluatorError::MissingApiKey)?;
        let url = format!("{}/v1/messages", self.config.base_url);
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
            system,
            messages: vec![Message { role: "user", content: user }],
        };

        debug!(url = %url, model = %self.config.model, "Submitting evaluation");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let body: MessagesResponse = response.json().await?;
        let text = body
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            return Err(EvaluatorError::InvalidResponse("response contained no text".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnthropicConfig {
        AnthropicConfig::from(&JudgeConfig {
            base_url: "http://localhost:1/".to_string(),
            ..JudgeConfig::default()
        })
    }

    #[test]
    fn test_config_from_judge_config() {
        let config = config();
        assert_eq!(config.base_url, "http://localhost:1");
        assert_eq!(config.api_version, API_VERSION);
        assert_eq!(config.max_tokens, 2000);
    }

    #[test]
    fn test_explicit_key_wins_over_env() {
        temp_env::with_var(API_KEY_ENV, Some("from-env"), || {
            let mut config = config();
            assert_eq!(config.get_api_key().as_deref(), Some("from-env"));
            config.api_key = Some("explicit".to_string());
            assert_eq!(config.get_api_key().as_deref(), Some("explicit"));
        });
    }

    #[test]
    fn test_missing_key_fails_before_any_request() {
        let evaluator = AnthropicEvaluator::new(config()).unwrap();
        temp_env::with_var_unset(API_KEY_ENV, || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let result = runtime.block_on(evaluator.evaluate("s", "u"));
            assert!(matches!(result, Err(EvaluatorError::MissingApiKey)));
        });
    }
}
