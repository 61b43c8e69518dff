//! Intent resolution
//!
//! LLM first, with strict JSON output; any call or parse failure drops to
//! the deterministic rules in [`rules`]. `resolve` never fails.

use crate::error::OrchestrationError;
use crate::llm::{ChatMessage, CompletionParams, LlmClient};
use crate::memory::{ConversationEntry, EntryRole};
use crate::models::{Intent, IntentAnalysis, ResolutionMethod};
use crate::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod rules;

pub use rules::{ACTION_CONFIDENCE_THRESHOLD, FALLTHROUGH_CONFIDENCE, RULE_CONFIDENCE};

const SYSTEM_PROMPT: &str = r#"You are the intent classifier for an insurance customer-service desk.

Classify the user's latest message into exactly one intent:
- health_check: account overview, status check, "how am I doing"
- policy_inquiry: questions about existing policies, coverage, deductibles, premiums
- quote_request: wants a price or quote for new coverage
- claim_status: asks about an existing claim
- claim_filing: wants to report an incident or file a new claim
- general_inquiry: anything else

Extract entities when present: customer_id, policy_id, claim_id,
coverage_type (auto, home, renters, life, travel),
incident_type (collision, theft, fire, water_damage).
Return identifiers exactly as written (e.g. "CUST-001"), never shortened.

Rules:
- Return ONLY valid JSON
- No explanation text
- JSON format:

{"intent": "policy_inquiry", "confidence": 0.92, "entities": {"customer_id": "CUST-001"}}"#;

pub struct IntentResolver {
    llm: Arc<dyn LlmClient>,
}

impl IntentResolver {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Classify `text` given the recent history. Never fails.
    pub async fn resolve(&self, text: &str, recent_history: &[ConversationEntry]) -> IntentAnalysis {
        if self.llm.is_demo() {
            debug!("Demo LLM - using rule-based intent classification");
            return rules::classify_with_history(text, recent_history);
        }

        match self.resolve_with_llm(text, recent_history).await {
            Ok(analysis) => {
                info!(
                    intent = %analysis.intent,
                    confidence = analysis.confidence,
                    "Intent resolved by LLM"
                );
                analysis
            }
            Err(e) => {
                warn!(error = %e, "LLM intent resolution failed, using rules");
                let analysis = rules::classify_with_history(text, recent_history);
                info!(
                    intent = %analysis.intent,
                    confidence = analysis.confidence,
                    "Intent resolved by rules"
                );
                analysis
            }
        }
    }

    async fn resolve_with_llm(
        &self,
        text: &str,
        recent_history: &[ConversationEntry],
    ) -> Result<IntentAnalysis> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(text, recent_history)),
        ];

        let raw = self
            .llm
            .invoke(&messages, CompletionParams::CLASSIFICATION, true)
            .await
            .map_err(|e| OrchestrationError::IntentResolution(e.to_string()))?;

        let mut analysis = parse_llm_analysis(&raw)?;

        // back-fill only what the model left out
        for (key, value) in rules::extract_entities(text) {
            analysis.entities.entry(key).or_insert(value);
        }

        Ok(analysis)
    }
}

fn build_user_prompt(text: &str, recent_history: &[ConversationEntry]) -> String {
    let mut prompt = String::new();

    if !recent_history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for entry in recent_history {
            let role = match entry.role {
                EntryRole::User => "User",
                EntryRole::Assistant => "Assistant",
                EntryRole::Error => "Assistant (error)",
            };
            prompt.push_str(&format!("- {}: {}\n", role, entry.content));
        }
        prompt.push_str("\n---\n\n");
    }

    prompt.push_str("Classify this message: ");
    prompt.push_str(text);
    prompt
}

#[derive(Debug, Deserialize)]
struct LlmIntentPayload {
    intent: String,
    confidence: f64,
    #[serde(default)]
    entities: Option<Map<String, Value>>,
}

/// Strict parse of `{intent, confidence, entities}`; tolerates a ```json fence
fn parse_llm_analysis(raw: &str) -> Result<IntentAnalysis> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let payload: LlmIntentPayload = serde_json::from_str(cleaned).map_err(|e| {
        OrchestrationError::IntentResolution(format!("invalid JSON: {} | raw={}", e, raw))
    })?;

    let intent: Intent = payload
        .intent
        .parse()
        .map_err(OrchestrationError::IntentResolution)?;

    let confidence = if payload.confidence.is_finite() {
        payload.confidence.clamp(0.0, 1.0) as f32
    } else {
        0.0
    };

    let mut entities = HashMap::new();
    for (key, value) in payload.entities.unwrap_or_default() {
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if !value.trim().is_empty() {
            entities.insert(key, value.trim().to_string());
        }
    }

    Ok(IntentAnalysis {
        intent,
        confidence,
        entities,
        method: ResolutionMethod::Llm,
    })
}
