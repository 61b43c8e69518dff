//! Error types for the insurance agent orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Pipeline Errors
    // =============================

    /// LLM classification failed or returned unusable JSON.
    /// Always recovered by the rule-based classifier.
    #[error("Intent resolution error: {0}")]
    IntentResolution(String),

    /// Both the primary and the fallback model failed.
    #[error("Model invocation error: {0}")]
    ModelInvocation(String),

    #[error("Agent unavailable: {agent}: {reason}")]
    AgentUnavailable { agent: String, reason: String },

    /// No catalog entry matched any name variant. Never retried.
    #[error("Action {action} could not be resolved on {agent} (tried: {})", tried.join(", "))]
    ActionUnresolved {
        agent: String,
        action: String,
        tried: Vec<String>,
    },

    #[error("Agent call to {agent} timed out after {timeout_ms} ms")]
    AgentTimeout { agent: String, timeout_ms: u64 },

    /// The agent answered with `success: false`.
    #[error("Agent {agent} rejected the task: {reason}")]
    AgentReply { agent: String, reason: String },

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl OrchestrationError {
    /// Whether the dispatcher may spend another attempt on this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrchestrationError::AgentUnavailable { .. }
                | OrchestrationError::AgentTimeout { .. }
                | OrchestrationError::AgentReply { .. }
                | OrchestrationError::HttpError(_)
                | OrchestrationError::SerializationError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_failure_is_not_retryable() {
        let err = OrchestrationError::ActionUnresolved {
            agent: "policy_agent".to_string(),
            action: "generate_quote".to_string(),
            tried: vec!["generate_quote".to_string(), "policy_agent.generate_quote".to_string()],
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("policy_agent.generate_quote"));
    }

    #[test]
    fn test_transport_failures_are_retryable() {
        let timeout = OrchestrationError::AgentTimeout {
            agent: "claims_agent".to_string(),
            timeout_ms: 500,
        };
        let refused = OrchestrationError::AgentUnavailable {
            agent: "claims_agent".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(timeout.is_retryable());
        assert!(refused.is_retryable());
        assert!(!OrchestrationError::InvalidPlan("too many steps".into()).is_retryable());
    }
}
