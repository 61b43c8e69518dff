//! Language model access
//!
//! Orchestration code depends only on [`LlmClient`]. The concrete
//! [`ModelResolver`] picks a backend once at startup and handles the
//! single primary → fallback retry.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod openai;
pub mod resolver;

pub use openai::{ChatBackend, ChatCompletion, ChatCompletionRequest, OpenAiCompatibleBackend};
pub use resolver::{ModelMode, ModelResolver, DEMO_RESPONSE};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionParams {
    pub const CLASSIFICATION: CompletionParams = CompletionParams {
        temperature: 0.2,
        max_tokens: 800,
    };

    pub const SYNTHESIS: CompletionParams = CompletionParams {
        temperature: 0.4,
        max_tokens: 800,
    };
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the assistant message content
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        params: CompletionParams,
        use_fallback: bool,
    ) -> Result<String>;

    /// Demo clients never reach a model; callers skip straight to templates
    fn is_demo(&self) -> bool {
        false
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::OrchestrationError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays fixed outputs; `None` simulates a failed invocation
    pub struct ScriptedLlm {
        outputs: Mutex<Vec<Option<String>>>,
        pub calls: AtomicUsize,
        pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        pub fn new(outputs: Vec<Option<&str>>) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(outputs.into_iter().map(|o| o.map(str::to_string)).collect()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn always(output: &str) -> Arc<Self> {
            Self::new(vec![Some(output)])
        }

        pub fn failing() -> Arc<Self> {
            Self::new(vec![None])
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn invoke(
            &self,
            messages: &[ChatMessage],
            _params: CompletionParams,
            _use_fallback: bool,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(messages.to_vec());

            let mut outputs = self.outputs.lock().unwrap();
            let next = if outputs.len() > 1 {
                outputs.remove(0)
            } else {
                outputs.first().cloned().flatten()
            };

            next.ok_or_else(|| OrchestrationError::ModelInvocation("scripted failure".to_string()))
        }
    }
}
