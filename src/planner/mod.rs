//! Execution planning
//!
//! Deterministic: maps an intent plus whatever parameters can be resolved
//! onto the static step table, or onto follow-up questions when a required
//! parameter is missing. The two plan shapes never mix.

use crate::error::OrchestrationError;
use crate::models::{ExecutionPlan, ExecutionStep, Intent, IntentAnalysis, StepDependency};
use crate::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info};

pub mod catalog;

use crate::intent::ACTION_CONFIDENCE_THRESHOLD;
use catalog::{question_for, templates_for, ParamSpec};

/// Maximum steps allowed per plan
const MAX_STEPS_PER_PLAN: usize = 20;

/// Authenticated data bound to the conversation, most authoritative source
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    bound: HashMap<String, String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_customer(customer_id: Option<&str>) -> Self {
        let mut context = Self::new();
        if let Some(id) = customer_id.map(str::trim).filter(|id| !id.is_empty()) {
            context.bind("customer_id", id);
        }
        context
    }

    pub fn bind(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.bound.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.bound.get(key).map(|v| v.as_str())
    }
}

#[derive(Debug, Default)]
pub struct ExecutionPlanner;

impl ExecutionPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, analysis: &IntentAnalysis, session: &SessionContext) -> Result<ExecutionPlan> {
        let intent = if analysis.confidence < ACTION_CONFIDENCE_THRESHOLD {
            debug!(
                intent = %analysis.intent,
                confidence = analysis.confidence,
                "Confidence below action threshold, planning as general inquiry"
            );
            Intent::GeneralInquiry
        } else {
            analysis.intent
        };

        let mut steps = Vec::new();
        let mut missing: Vec<&'static str> = Vec::new();

        for template in templates_for(intent) {
            if let Some(gate) = template.only_if {
                if resolve_param(gate, None, analysis, session).is_none() {
                    continue;
                }
            }

            let mut params = Map::new();
            for spec in template.params {
                match resolve_param(spec.name, Some(spec), analysis, session) {
                    Some(value) => {
                        params.insert(spec.name.to_string(), value);
                    }
                    None if spec.required => {
                        if !missing.contains(&spec.name) {
                            missing.push(spec.name);
                        }
                    }
                    None => {}
                }
            }

            steps.push(ExecutionStep {
                order: template.order,
                action: template.action,
                params,
                depends_on: template.depends_on.map(|dep| StepDependency {
                    step: dep.step,
                    pointer: dep.pointer.to_string(),
                    param: dep.param.to_string(),
                }),
                criticality: template.criticality,
                max_retries: None,
            });
        }

        if !missing.is_empty() {
            info!(%intent, ?missing, "Missing parameters, asking follow-up questions");
            let questions = missing.iter().map(|field| question_for(field)).collect();
            return Ok(ExecutionPlan::questions(intent, questions));
        }

        if steps.len() > MAX_STEPS_PER_PLAN {
            return Err(OrchestrationError::InvalidPlan(format!(
                "Plan exceeds maximum allowed steps ({})",
                MAX_STEPS_PER_PLAN
            )));
        }

        info!(%intent, step_count = steps.len(), "Plan created");
        Ok(ExecutionPlan::steps(intent, steps))
    }
}

/// Session data, then extracted entities, then the declared default
fn resolve_param(
    name: &str,
    spec: Option<&ParamSpec>,
    analysis: &IntentAnalysis,
    session: &SessionContext,
) -> Option<Value> {
    session
        .get(name)
        .or_else(|| analysis.entity(name))
        .map(|value| Value::String(value.to_string()))
        .or_else(|| spec.and_then(|s| s.default).map(|d| d.to_value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentAction;
    use crate::models::{Criticality, PlanBody, ResolutionMethod};

    fn analysis(intent: Intent, entities: &[(&str, &str)]) -> IntentAnalysis {
        IntentAnalysis {
            intent,
            confidence: 0.8,
            entities: entities
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            method: ResolutionMethod::Rule,
        }
    }

    #[test]
    fn test_policy_inquiry_from_entities() {
        let planner = ExecutionPlanner::new();
        let plan = planner
            .plan(
                &analysis(Intent::PolicyInquiry, &[("customer_id", "CUST-001")]),
                &SessionContext::new(),
            )
            .unwrap();

        let steps = plan.step_list();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, AgentAction::GetCustomerPolicies);
        assert_eq!(steps[0].params["customer_id"], "CUST-001");
        assert_eq!(steps[0].criticality, Criticality::Required);
    }

    #[test]
    fn test_optional_step_included_when_gate_resolves() {
        let plan = ExecutionPlanner::new()
            .plan(
                &analysis(
                    Intent::PolicyInquiry,
                    &[("customer_id", "CUST-001"), ("policy_id", "POL-1001")],
                ),
                &SessionContext::new(),
            )
            .unwrap();

        let actions: Vec<AgentAction> = plan.step_list().iter().map(|s| s.action).collect();
        assert_eq!(
            actions,
            vec![AgentAction::GetCustomerPolicies, AgentAction::GetPolicyDetails]
        );
    }

    #[test]
    fn test_session_beats_entities() {
        let session = SessionContext::for_customer(Some("CUST-777"));
        let plan = ExecutionPlanner::new()
            .plan(&analysis(Intent::PolicyInquiry, &[("customer_id", "CUST-001")]), &session)
            .unwrap();

        assert_eq!(plan.step_list()[0].params["customer_id"], "CUST-777");
    }

    #[test]
    fn test_blank_session_customer_is_ignored() {
        let session = SessionContext::for_customer(Some("   "));
        assert!(session.get("customer_id").is_none());
    }

    #[test]
    fn test_quote_without_coverage_asks_question() {
        let session = SessionContext::for_customer(Some("CUST-001"));
        let plan = ExecutionPlanner::new()
            .plan(&analysis(Intent::QuoteRequest, &[]), &session)
            .unwrap();

        match &plan.body {
            PlanBody::Questions { questions } => {
                assert_eq!(
                    questions,
                    &vec!["What type of coverage would you like a quote for?".to_string()]
                );
            }
            PlanBody::Steps { .. } => panic!("expected information-gathering plan"),
        }
    }

    #[test]
    fn test_defaults_fill_required_params() {
        let plan = ExecutionPlanner::new()
            .plan(
                &analysis(
                    Intent::QuoteRequest,
                    &[("customer_id", "CUST-001"), ("coverage_type", "auto")],
                ),
                &SessionContext::new(),
            )
            .unwrap();

        let params = &plan.step_list()[0].params;
        assert_eq!(params["coverage_type"], "auto");
        assert_eq!(params["term_months"], serde_json::json!(12));
    }

    #[test]
    fn test_health_check_limit_is_numeric() {
        let plan = ExecutionPlanner::new()
            .plan(
                &analysis(Intent::HealthCheck, &[("customer_id", "CUST-001")]),
                &SessionContext::new(),
            )
            .unwrap();

        let history = plan
            .step_list()
            .iter()
            .find(|s| s.action == AgentAction::GetClaimsHistory)
            .unwrap();
        assert_eq!(history.params["limit"], serde_json::json!(10));
        assert_eq!(history.params["customer_id"], "CUST-001");
    }

    #[test]
    fn test_missing_fields_are_deduplicated_in_order() {
        let plan = ExecutionPlanner::new()
            .plan(&analysis(Intent::ClaimFiling, &[]), &SessionContext::new())
            .unwrap();

        match plan.body {
            PlanBody::Questions { questions } => {
                assert_eq!(questions.len(), 2);
                assert!(questions[0].contains("customer ID"));
                assert!(questions[1].starts_with("What happened?"));
            }
            PlanBody::Steps { .. } => panic!("expected questions"),
        }
    }

    #[test]
    fn test_unresolvable_intents_never_yield_steps() {
        for intent in Intent::ALL {
            let plan = ExecutionPlanner::new()
                .plan(&analysis(intent, &[]), &SessionContext::new())
                .unwrap();

            for step in plan.step_list() {
                for spec in templates_for(intent)
                    .iter()
                    .find(|t| t.action == step.action)
                    .unwrap()
                    .params
                    .iter()
                    .filter(|s| s.required)
                {
                    assert!(step.params.contains_key(spec.name));
                }
            }
        }
    }

    #[test]
    fn test_claim_filing_declares_dependencies() {
        let plan = ExecutionPlanner::new()
            .plan(
                &analysis(
                    Intent::ClaimFiling,
                    &[("customer_id", "CUST-001"), ("incident_type", "theft")],
                ),
                &SessionContext::new(),
            )
            .unwrap();

        let steps = plan.step_list();
        assert_eq!(steps.len(), 3);
        let file_claim = &steps[1];
        assert!(!file_claim.params.contains_key("policy_id"));
        let dep = file_claim.depends_on.as_ref().unwrap();
        assert_eq!(dep.step, 1);
        assert_eq!(dep.param, "policy_id");
        assert_eq!(steps[2].criticality, Criticality::BestEffort);
    }

    #[test]
    fn test_low_confidence_plans_no_agent_calls() {
        let mut low = analysis(Intent::PolicyInquiry, &[("customer_id", "CUST-001")]);
        low.confidence = 0.2;

        let plan = ExecutionPlanner::new().plan(&low, &SessionContext::new()).unwrap();
        assert_eq!(plan.intent, Intent::GeneralInquiry);
        assert!(plan.step_list().is_empty());
        assert!(!plan.is_information_gathering());
    }
}
