//! OpenAI-compatible chat completions client
//!
//! Speaks `{model, messages, temperature, max_tokens}` to any provider or
//! gateway exposing `/chat/completions`. Uses a long-lived reqwest::Client
//! for connection pooling.

use super::ChatMessage;
use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// What the orchestrator keeps from a completion
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}

/// A single-model completion call. No fallback logic here.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion>;
}

/// Reusable client (connection-pooled)
pub struct OpenAiCompatibleBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatibleBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatibleBackend {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletion> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, messages = request.messages.len(), "Calling chat completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(model = %request.model, "LLM request failed: {}", e);
                OrchestrationError::ModelInvocation(format!("request to {} failed: {}", request.model, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(model = %request.model, %status, "LLM error response: {}", error_text);
            return Err(OrchestrationError::ModelInvocation(format!(
                "{} returned {}: {}",
                request.model, status, error_text
            )));
        }

        let body: CompletionResponse = response.json().await.map_err(|e| {
            OrchestrationError::ModelInvocation(format!("malformed completion body: {}", e))
        })?;

        parse_completion(body, &request.model)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn parse_completion(body: CompletionResponse, requested_model: &str) -> Result<ChatCompletion> {
    let choice = body.choices.into_iter().next().ok_or_else(|| {
        OrchestrationError::ModelInvocation(format!("{} returned no choices", requested_model))
    })?;

    let content = choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            OrchestrationError::ModelInvocation(format!("{} returned empty content", requested_model))
        })?;

    Ok(ChatCompletion {
        content,
        model: body.model.unwrap_or_else(|| requested_model.to_string()),
        usage: body.usage,
        finish_reason: choice.finish_reason,
    })
}
