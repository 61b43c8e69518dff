//! Runtime configuration
//!
//! Binaries load `.env` first, then call [`OrchestratorConfig::from_env`].
//! Nothing else in the crate reads the environment.

use crate::agents::{AgentKind, AgentRegistry};
use crate::error::OrchestrationError;
use crate::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "https://api.portkey.ai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Fixed-delay retry policy for agent calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub api_key: String,
    pub primary_model: String,
    pub fallback_model: Option<String>,
}

/// Credentials as found at startup; `ModelResolver` picks the mode.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub gateway: Option<GatewaySettings>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub request_timeout: Duration,
}

impl LlmSettings {
    pub fn demo() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub llm: LlmSettings,
    pub agents: AgentRegistry,
    pub retry: RetryPolicy,
    pub agent_call_timeout: Duration,
    /// Conversation entries handed to the intent resolver
    pub history_window: usize,
    pub port: u16,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::demo(),
            agents: default_registry(),
            retry: RetryPolicy::default(),
            agent_call_timeout: Duration::from_secs(30),
            history_window: 6,
            port: 8080,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let gateway = non_empty_var("LLM_GATEWAY_API_KEY").map(|api_key| GatewaySettings {
            base_url: non_empty_var("LLM_GATEWAY_URL")
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            api_key,
            primary_model: non_empty_var("LLM_PRIMARY_MODEL")
                .unwrap_or_else(|| "gpt-4o".to_string()),
            fallback_model: Some(
                non_empty_var("LLM_FALLBACK_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ),
        });

        let llm = LlmSettings {
            gateway,
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            gemini_api_key: non_empty_var("GEMINI_API_KEY"),
            request_timeout: Duration::from_secs(parse_var("LLM_TIMEOUT_SECS", 60)?),
        };

        let mut agents = AgentRegistry::new();
        for kind in AgentKind::ALL {
            let var = format!("{}_URL", kind.name().to_uppercase());
            let url = non_empty_var(&var).unwrap_or_else(|| default_agent_url(kind).to_string());
            agents.register(kind, url);
        }

        let retry = RetryPolicy {
            max_retries: parse_var("AGENT_MAX_RETRIES", defaults.retry.max_retries)?,
            delay: Duration::from_millis(parse_var(
                "AGENT_RETRY_DELAY_MS",
                defaults.retry.delay.as_millis() as u64,
            )?),
        };

        let port = match non_empty_var("PORT").or_else(|| non_empty_var("API_PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| OrchestrationError::Config(format!("invalid port '{}'", raw)))?,
            None => defaults.port,
        };

        Ok(Self {
            llm,
            agents,
            retry,
            agent_call_timeout: Duration::from_secs(parse_var("AGENT_CALL_TIMEOUT_SECS", 30)?),
            history_window: parse_var("HISTORY_WINDOW", defaults.history_window)?,
            port,
        })
    }
}

fn default_agent_url(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Policy => "http://localhost:8101",
        AgentKind::Claims => "http://localhost:8102",
        AgentKind::Risk => "http://localhost:8103",
    }
}

pub fn default_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for kind in AgentKind::ALL {
        registry.register(kind, default_agent_url(kind));
    }
    registry
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| OrchestrationError::Config(format!("invalid value for {}: '{}'", name, raw))),
        None => Ok(default),
    }
}
