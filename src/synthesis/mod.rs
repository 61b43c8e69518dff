//! Response synthesis
//!
//! LLM first, with a fixed four-section layout. When the model is
//! unavailable (or in demo mode) the reply is built from templated
//! sentences over the agent data. Degraded results never reach the model.

use crate::agents::AgentAction;
use crate::llm::{ChatMessage, CompletionParams, LlmClient};
use crate::models::{AggregatedResults, Intent, IntentAnalysis};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEGRADED_REPLY: &str =
    "I'm having trouble retrieving that right now. Please try again in a few minutes.";

pub const APOLOGY_REPLY: &str =
    "Sorry, something went wrong while handling your request. Please try again.";

const SYSTEM_PROMPT: &str = r#"You are a friendly insurance customer-service assistant.
Answer using ONLY the account data provided. Never invent policies, claims or amounts.

Structure the reply with these sections:
## Status
## Analysis
## Account Summary
## Next Steps

Keep it concise and plain-spoken."#;

pub struct ResponseSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl ResponseSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Reply text for executed results. Never empty.
    pub async fn synthesize(&self, analysis: &IntentAnalysis, results: &AggregatedResults) -> String {
        if results.is_degraded() {
            info!(intent = %analysis.intent, "Synthesizing degraded reply");
            return degraded_reply(results);
        }

        if self.llm.is_demo() {
            debug!("Demo LLM - using templated reply");
            return templated_reply(analysis.intent, results);
        }

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(analysis, results)),
        ];

        match self
            .llm
            .invoke(&messages, CompletionParams::SYNTHESIS, true)
            .await
        {
            Ok(content) if !content.trim().is_empty() => content.trim().to_string(),
            Ok(_) => {
                warn!("LLM returned empty synthesis, using template");
                templated_reply(analysis.intent, results)
            }
            Err(e) => {
                warn!(error = %e, "LLM synthesis failed, using template");
                templated_reply(analysis.intent, results)
            }
        }
    }
}

fn build_user_prompt(analysis: &IntentAnalysis, results: &AggregatedResults) -> String {
    let data = serde_json::to_string_pretty(&results.successful_data())
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "Customer intent: {} (confidence {:.2})\n\nAccount data:\n```json\n{}\n```",
        analysis.intent, analysis.confidence, data
    )
}

/// Follow-up questions for an information-gathering plan
pub fn questions_reply(questions: &[String]) -> String {
    match questions {
        [] => "Could you tell me a little more about what you need?".to_string(),
        [only] => only.clone(),
        many => {
            let mut out = String::from("I need a few more details before I can help:\n");
            for question in many {
                out.push_str(&format!("- {}\n", question));
            }
            out.trim_end().to_string()
        }
    }
}

/// Fixed apology plus whatever facts were already retrieved
pub fn degraded_reply(results: &AggregatedResults) -> String {
    let facts = fact_sentences(results);
    if facts.is_empty() {
        DEGRADED_REPLY.to_string()
    } else {
        format!("{} Here is what I could find so far: {}", DEGRADED_REPLY, facts.join(" "))
    }
}

/// Deterministic reply from the agent data fields
pub fn templated_reply(intent: Intent, results: &AggregatedResults) -> String {
    let facts = fact_sentences(results);
    if !facts.is_empty() {
        return facts.join(" ");
    }

    match intent {
        Intent::GeneralInquiry => {
            "I can help with your policies, quotes and claims. What would you like to do?"
                .to_string()
        }
        Intent::HealthCheck => "I couldn't find any account details to summarize yet.".to_string(),
        Intent::PolicyInquiry => "I couldn't find any policies on file for you.".to_string(),
        Intent::QuoteRequest => "I wasn't able to put together a quote just now.".to_string(),
        Intent::ClaimStatus => "I couldn't find any claims on file for you.".to_string(),
        Intent::ClaimFiling => "I wasn't able to file that claim just now.".to_string(),
    }
}

fn fact_sentences(results: &AggregatedResults) -> Vec<String> {
    const ORDER: [AgentAction; 8] = [
        AgentAction::GetCustomerPolicies,
        AgentAction::GetPolicyDetails,
        AgentAction::GenerateQuote,
        AgentAction::GetClaimsHistory,
        AgentAction::GetClaimStatus,
        AgentAction::FileClaim,
        AgentAction::ScoreClaim,
        AgentAction::AssessCustomerRisk,
    ];

    ORDER
        .iter()
        .filter_map(|action| {
            let data = results.data_for(*action)?;
            let sentence = match action {
                AgentAction::GetCustomerPolicies => policies_sentence(data),
                AgentAction::GetPolicyDetails => policy_details_sentence(data),
                AgentAction::GenerateQuote => quote_sentence(data),
                AgentAction::GetClaimsHistory => claims_sentence(data),
                AgentAction::GetClaimStatus => claim_status_sentence(data),
                AgentAction::FileClaim => filed_claim_sentence(data),
                AgentAction::ScoreClaim => review_sentence(data),
                AgentAction::AssessCustomerRisk => risk_sentence(data),
            };
            sentence.filter(|s| !s.is_empty())
        })
        .collect()
}

fn text(data: &Value, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn amount(data: &Value, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::Number(n) => n.as_f64().map(|v| format!("${:.2}", v)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|v| format!("${:.2}", v)),
        _ => None,
    }
}

fn counted(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", count, plural)
    }
}

fn is_active(policy: &Value) -> bool {
    text(policy, "status")
        .map(|s| s.eq_ignore_ascii_case("active"))
        .unwrap_or(true)
}

fn policies_sentence(data: &Value) -> Option<String> {
    let policies = data.get("policies")?.as_array()?;
    let active: Vec<&Value> = policies.iter().filter(|p| is_active(p)).collect();

    if active.is_empty() {
        return Some("You have no active policies on file.".to_string());
    }

    let described: Vec<String> = active
        .iter()
        .map(|p| match (text(p, "policy_type"), text(p, "policy_id")) {
            (Some(kind), Some(id)) => format!("{} ({})", kind, id),
            (Some(kind), None) => kind,
            (None, Some(id)) => id,
            (None, None) => "policy".to_string(),
        })
        .collect();

    Some(format!(
        "You have {}: {}.",
        counted(active.len(), "active policy", "active policies"),
        described.join(", ")
    ))
}

fn policy_details_sentence(data: &Value) -> Option<String> {
    let id = text(data, "policy_id")?;
    let mut sentence = match text(data, "policy_type") {
        Some(kind) => format!("Policy {} ({})", id, kind),
        None => format!("Policy {}", id),
    };

    match (amount(data, "coverage_limit"), amount(data, "deductible")) {
        (Some(limit), Some(deductible)) => sentence.push_str(&format!(
            " has a coverage limit of {} and a deductible of {}.",
            limit, deductible
        )),
        (Some(limit), None) => sentence.push_str(&format!(" has a coverage limit of {}.", limit)),
        (None, Some(deductible)) => {
            sentence.push_str(&format!(" has a deductible of {}.", deductible))
        }
        (None, None) => sentence.push_str(" is on file."),
    }
    Some(sentence)
}

fn quote_sentence(data: &Value) -> Option<String> {
    let premium = amount(data, "monthly_premium")?;
    let coverage = text(data, "coverage_type").unwrap_or_else(|| "requested".to_string());
    let mut sentence = format!("Your {} quote is {} per month", coverage, premium);

    if let Some(term) = text(data, "term_months") {
        sentence.push_str(&format!(" for a {}-month term", term));
    }
    if let Some(quote_id) = text(data, "quote_id") {
        sentence.push_str(&format!(" (quote {})", quote_id));
    }
    sentence.push('.');
    Some(sentence)
}

fn claims_sentence(data: &Value) -> Option<String> {
    let claims = data.get("claims")?.as_array()?;
    if claims.is_empty() {
        return Some("You have no claims on file.".to_string());
    }

    let described: Vec<String> = claims
        .iter()
        .filter_map(|c| match (text(c, "claim_id"), text(c, "status")) {
            (Some(id), Some(status)) => Some(format!("{} ({})", id, status)),
            (Some(id), None) => Some(id),
            _ => None,
        })
        .collect();

    if described.is_empty() {
        Some(format!("You have {} on file.", counted(claims.len(), "claim", "claims")))
    } else {
        Some(format!(
            "You have {} on file: {}.",
            counted(claims.len(), "claim", "claims"),
            described.join(", ")
        ))
    }
}

fn claim_status_sentence(data: &Value) -> Option<String> {
    if data.get("claims").is_some() {
        return claims_sentence(data);
    }

    let id = text(data, "claim_id")?;
    Some(match text(data, "status") {
        Some(status) => format!("Claim {} is currently {}.", id, status),
        None => format!("Claim {} is on file.", id),
    })
}

fn filed_claim_sentence(data: &Value) -> Option<String> {
    let id = text(data, "claim_id")?;
    Some(match text(data, "status") {
        Some(status) => format!("Your claim {} has been filed and is {}.", id, status),
        None => format!("Your claim {} has been filed.", id),
    })
}

fn review_sentence(data: &Value) -> Option<String> {
    let flagged = data.get("flagged")?.as_bool()?;
    flagged.then(|| "It has been sent for an additional review.".to_string())
}

fn risk_sentence(data: &Value) -> Option<String> {
    let level = text(data, "risk_level")?;
    Some(match text(data, "score") {
        Some(score) => format!("Your current risk level is {} (score {}).", level, score),
        None => format!("Your current risk level is {}.", level),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::ModelResolver;
    use crate::models::{
        Criticality, DegradedMarker, ExecutionStatus, ResolutionMethod, StepResult,
    };
    use serde_json::json;

    fn analysis(intent: Intent) -> IntentAnalysis {
        IntentAnalysis {
            intent,
            confidence: 0.8,
            entities: Default::default(),
            method: ResolutionMethod::Rule,
        }
    }

    fn with_data(entries: &[(AgentAction, Value)]) -> AggregatedResults {
        let mut results = AggregatedResults::default();
        for (order, (action, data)) in entries.iter().enumerate() {
            results.insert(
                action.as_str().to_string(),
                StepResult {
                    order: order as u32 + 1,
                    agent: action.agent(),
                    action: *action,
                    criticality: Criticality::Required,
                    status: ExecutionStatus::Success,
                    data: Some(data.clone()),
                    error: None,
                },
            );
        }
        results
    }

    fn policies() -> AggregatedResults {
        with_data(&[(
            AgentAction::GetCustomerPolicies,
            json!({"policies": [
                {"policy_id": "POL-1001", "policy_type": "auto", "status": "active", "premium": 120.0},
                {"policy_id": "POL-1002", "policy_type": "home", "status": "active", "premium": 95.5},
                {"policy_id": "POL-0999", "policy_type": "life", "status": "lapsed"}
            ]}),
        )])
    }

    #[tokio::test]
    async fn test_llm_reply_is_used_and_prompt_has_sections() {
        let llm = ScriptedLlm::always("## Status\nAll good.");
        let synthesizer = ResponseSynthesizer::new(llm.clone());

        let reply = synthesizer
            .synthesize(&analysis(Intent::PolicyInquiry), &policies())
            .await;

        assert_eq!(reply, "## Status\nAll good.");
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0][0].content.contains("## Next Steps"));
        assert!(prompts[0][1].content.contains("POL-1001"));
        assert!(prompts[0][1].content.contains("policy_inquiry"));
    }

    #[tokio::test]
    async fn test_llm_failure_uses_template() {
        let synthesizer = ResponseSynthesizer::new(ScriptedLlm::failing());

        let reply = synthesizer
            .synthesize(&analysis(Intent::PolicyInquiry), &policies())
            .await;

        assert_eq!(
            reply,
            "You have 2 active policies: auto (POL-1001), home (POL-1002)."
        );
    }

    #[tokio::test]
    async fn test_empty_llm_reply_uses_template() {
        let synthesizer = ResponseSynthesizer::new(ScriptedLlm::always("   "));
        let reply = synthesizer
            .synthesize(&analysis(Intent::GeneralInquiry), &AggregatedResults::default())
            .await;
        assert!(reply.starts_with("I can help with"));
    }

    #[tokio::test]
    async fn test_demo_mode_uses_template() {
        let synthesizer = ResponseSynthesizer::new(Arc::new(ModelResolver::demo()));
        let results = with_data(&[(
            AgentAction::GenerateQuote,
            json!({"coverage_type": "auto", "monthly_premium": 87.5, "term_months": 12, "quote_id": "Q-77"}),
        )]);

        let reply = synthesizer
            .synthesize(&analysis(Intent::QuoteRequest), &results)
            .await;
        assert_eq!(
            reply,
            "Your auto quote is $87.50 per month for a 12-month term (quote Q-77)."
        );
    }

    #[tokio::test]
    async fn test_degraded_results_skip_the_model() {
        let llm = ScriptedLlm::always("should not be used");
        let synthesizer = ResponseSynthesizer::new(llm.clone());

        let mut results = policies();
        results.degraded = Some(DegradedMarker {
            step: 2,
            agent: AgentKind::Claims,
            action: AgentAction::FileClaim,
            reason: "unavailable".to_string(),
        });

        let reply = synthesizer
            .synthesize(&analysis(Intent::ClaimFiling), &results)
            .await;

        assert!(reply.starts_with(DEGRADED_REPLY));
        assert!(reply.contains("POL-1001"));
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_failed_steps_are_not_reported() {
        let mut results = policies();
        results.insert(
            "get_claims_history".to_string(),
            StepResult {
                order: 2,
                agent: AgentKind::Claims,
                action: AgentAction::GetClaimsHistory,
                criticality: Criticality::BestEffort,
                status: ExecutionStatus::Failed,
                data: None,
                error: Some("down".to_string()),
            },
        );

        let reply = templated_reply(Intent::HealthCheck, &results);
        assert!(!reply.contains("claim"));
    }

    #[test]
    fn test_health_check_template_covers_all_sources() {
        let results = with_data(&[
            (
                AgentAction::GetCustomerPolicies,
                json!({"policies": [{"policy_id": "POL-1", "policy_type": "auto"}]}),
            ),
            (
                AgentAction::GetClaimsHistory,
                json!({"claims": [{"claim_id": "CLM-1", "status": "open"}]}),
            ),
            (
                AgentAction::AssessCustomerRisk,
                json!({"risk_level": "low", "score": 12}),
            ),
        ]);

        assert_eq!(
            templated_reply(Intent::HealthCheck, &results),
            "You have 1 active policy: auto (POL-1). You have 1 claim on file: CLM-1 (open). \
             Your current risk level is low (score 12)."
        );
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let results = with_data(&[
            (AgentAction::GetPolicyDetails, json!({"policy_id": "POL-7", "deductible": "500"})),
            (AgentAction::FileClaim, json!({"claim_id": "CLM-9"})),
            (AgentAction::ScoreClaim, json!({"fraud_score": 0.1, "flagged": false})),
        ]);

        assert_eq!(
            templated_reply(Intent::ClaimFiling, &results),
            "Policy POL-7 has a deductible of $500.00. Your claim CLM-9 has been filed."
        );
    }

    #[test]
    fn test_templates_never_empty() {
        for intent in Intent::ALL {
            assert!(!templated_reply(intent, &AggregatedResults::default()).is_empty());
        }
        assert_eq!(degraded_reply(&AggregatedResults::default()), DEGRADED_REPLY);
    }

    #[test]
    fn test_questions_reply() {
        let one = vec!["What type of coverage would you like a quote for?".to_string()];
        assert_eq!(questions_reply(&one), one[0]);

        let two = vec!["First?".to_string(), "Second?".to_string()];
        assert_eq!(
            questions_reply(&two),
            "I need a few more details before I can help:\n- First?\n- Second?"
        );
    }
}
