//! Startup model selection and single-fallback invocation

use super::openai::{ChatBackend, ChatCompletionRequest, OpenAiCompatibleBackend};
use super::{ChatMessage, CompletionParams, LlmClient};
use crate::config::{LlmSettings, GEMINI_OPENAI_BASE_URL, OPENAI_BASE_URL};
use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEMO_RESPONSE: &str =
    "[demo mode] No language model is configured; responses are generated from templates.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelMode {
    Gateway {
        primary: String,
        fallback: Option<String>,
    },
    Direct {
        provider: &'static str,
        primary: String,
        fallback: Option<String>,
    },
    Demo,
}

impl ModelMode {
    fn models(&self) -> Option<(&str, Option<&str>)> {
        match self {
            ModelMode::Gateway { primary, fallback }
            | ModelMode::Direct {
                primary, fallback, ..
            } => Some((primary.as_str(), fallback.as_deref())),
            ModelMode::Demo => None,
        }
    }
}

pub struct ModelResolver {
    mode: ModelMode,
    backend: Option<Arc<dyn ChatBackend>>,
}

impl ModelResolver {
    /// Priority: gateway credential, then direct provider key, then demo.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        if let Some(gateway) = &settings.gateway {
            let backend = OpenAiCompatibleBackend::new(
                &gateway.base_url,
                &gateway.api_key,
                settings.request_timeout,
            )?;
            let mode = ModelMode::Gateway {
                primary: gateway.primary_model.clone(),
                fallback: gateway.fallback_model.clone(),
            };
            info!(?mode, base_url = %gateway.base_url, "LLM routed through gateway");
            return Ok(Self::with_backend(mode, Arc::new(backend)));
        }

        if let Some(key) = &settings.openai_api_key {
            let backend = OpenAiCompatibleBackend::new(OPENAI_BASE_URL, key, settings.request_timeout)?;
            let mode = ModelMode::Direct {
                provider: "openai",
                primary: "gpt-4o".to_string(),
                fallback: Some("gpt-4o-mini".to_string()),
            };
            info!(?mode, "LLM using direct provider");
            return Ok(Self::with_backend(mode, Arc::new(backend)));
        }

        if let Some(key) = &settings.gemini_api_key {
            let backend =
                OpenAiCompatibleBackend::new(GEMINI_OPENAI_BASE_URL, key, settings.request_timeout)?;
            let mode = ModelMode::Direct {
                provider: "gemini",
                primary: "gemini-2.0-flash".to_string(),
                fallback: Some("gemini-1.5-flash".to_string()),
            };
            info!(?mode, "LLM using direct provider");
            return Ok(Self::with_backend(mode, Arc::new(backend)));
        }

        warn!("No LLM credentials configured - running in demo mode");
        Ok(Self::demo())
    }

    pub fn with_backend(mode: ModelMode, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            mode,
            backend: Some(backend),
        }
    }

    pub fn demo() -> Self {
        Self {
            mode: ModelMode::Demo,
            backend: None,
        }
    }

    pub fn mode(&self) -> &ModelMode {
        &self.mode
    }

    async fn attempt(
        &self,
        backend: &dyn ChatBackend,
        model: &str,
        messages: &[ChatMessage],
        params: CompletionParams,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };
        let completion = backend.complete(&request).await?;
        info!(
            model = %completion.model,
            finish_reason = ?completion.finish_reason,
            "LLM completion received"
        );
        Ok(completion.content)
    }
}

#[async_trait]
impl LlmClient for ModelResolver {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        params: CompletionParams,
        use_fallback: bool,
    ) -> Result<String> {
        let (Some((primary, fallback)), Some(backend)) = (self.mode.models(), self.backend.as_deref())
        else {
            return Ok(DEMO_RESPONSE.to_string());
        };

        let primary_error = match self.attempt(backend, primary, messages, params).await {
            Ok(content) => return Ok(content),
            Err(e) => e,
        };

        let fallback = fallback.filter(|f| use_fallback && *f != primary);
        let Some(fallback) = fallback else {
            return Err(OrchestrationError::ModelInvocation(format!(
                "{} failed: {}",
                primary, primary_error
            )));
        };

        warn!(%primary, %fallback, error = %primary_error, "Primary model failed, trying fallback");

        self.attempt(backend, fallback, messages, params)
            .await
            .map_err(|fallback_error| {
                OrchestrationError::ModelInvocation(format!(
                    "{} failed: {}; fallback {} failed: {}",
                    primary, primary_error, fallback, fallback_error
                ))
            })
    }

    fn is_demo(&self) -> bool {
        self.mode == ModelMode::Demo
    }
}
