//! Static intent → step table

use crate::agents::AgentAction;
use crate::models::{Criticality, Intent};
use serde_json::Value;

/// Value sent when nothing else resolves the param
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Text(&'static str),
    Integer(i64),
}

impl ParamDefault {
    pub fn to_value(self) -> Value {
        match self {
            ParamDefault::Text(text) => Value::String(text.to_string()),
            ParamDefault::Integer(n) => Value::from(n),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<ParamDefault>,
}

const fn required(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
        default: None,
    }
}

const fn optional(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
        default: None,
    }
}

const fn defaulted(name: &'static str, default: ParamDefault) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
        default: Some(default),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DependencySpec {
    pub step: u32,
    pub pointer: &'static str,
    pub param: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct StepTemplate {
    pub order: u32,
    pub action: AgentAction,
    pub params: &'static [ParamSpec],
    pub criticality: Criticality,
    pub depends_on: Option<DependencySpec>,
    /// Step is planned only when this param resolves
    pub only_if: Option<&'static str>,
}

const HEALTH_CHECK: &[StepTemplate] = &[
    StepTemplate {
        order: 1,
        action: AgentAction::GetCustomerPolicies,
        params: &[required("customer_id")],
        criticality: Criticality::Required,
        depends_on: None,
        only_if: None,
    },
    StepTemplate {
        order: 2,
        action: AgentAction::GetClaimsHistory,
        params: &[required("customer_id"), defaulted("limit", ParamDefault::Integer(10))],
        criticality: Criticality::BestEffort,
        depends_on: None,
        only_if: None,
    },
    StepTemplate {
        order: 3,
        action: AgentAction::AssessCustomerRisk,
        params: &[required("customer_id")],
        criticality: Criticality::BestEffort,
        depends_on: None,
        only_if: None,
    },
];

const POLICY_INQUIRY: &[StepTemplate] = &[
    StepTemplate {
        order: 1,
        action: AgentAction::GetCustomerPolicies,
        params: &[required("customer_id")],
        criticality: Criticality::Required,
        depends_on: None,
        only_if: None,
    },
    StepTemplate {
        order: 2,
        action: AgentAction::GetPolicyDetails,
        params: &[required("policy_id"), optional("customer_id")],
        criticality: Criticality::BestEffort,
        depends_on: None,
        only_if: Some("policy_id"),
    },
];

const QUOTE_REQUEST: &[StepTemplate] = &[StepTemplate {
    order: 1,
    action: AgentAction::GenerateQuote,
    params: &[
        required("customer_id"),
        required("coverage_type"),
        defaulted("term_months", ParamDefault::Integer(12)),
    ],
    criticality: Criticality::Required,
    depends_on: None,
    only_if: None,
}];

const CLAIM_STATUS: &[StepTemplate] = &[StepTemplate {
    order: 1,
    action: AgentAction::GetClaimStatus,
    params: &[required("customer_id"), optional("claim_id")],
    criticality: Criticality::Required,
    depends_on: None,
    only_if: None,
}];

const CLAIM_FILING: &[StepTemplate] = &[
    StepTemplate {
        order: 1,
        action: AgentAction::GetCustomerPolicies,
        params: &[required("customer_id")],
        criticality: Criticality::Required,
        depends_on: None,
        only_if: None,
    },
    StepTemplate {
        order: 2,
        action: AgentAction::FileClaim,
        params: &[required("customer_id"), required("incident_type")],
        criticality: Criticality::Required,
        depends_on: Some(DependencySpec {
            step: 1,
            pointer: "/policies/0/policy_id",
            param: "policy_id",
        }),
        only_if: None,
    },
    StepTemplate {
        order: 3,
        action: AgentAction::ScoreClaim,
        params: &[required("customer_id")],
        criticality: Criticality::BestEffort,
        depends_on: Some(DependencySpec {
            step: 2,
            pointer: "/claim_id",
            param: "claim_id",
        }),
        only_if: None,
    },
];

pub fn templates_for(intent: Intent) -> &'static [StepTemplate] {
    match intent {
        Intent::HealthCheck => HEALTH_CHECK,
        Intent::PolicyInquiry => POLICY_INQUIRY,
        Intent::QuoteRequest => QUOTE_REQUEST,
        Intent::ClaimStatus => CLAIM_STATUS,
        Intent::ClaimFiling => CLAIM_FILING,
        Intent::GeneralInquiry => &[],
    }
}

/// Follow-up question for a field the planner could not resolve
pub fn question_for(field: &str) -> String {
    match field {
        "customer_id" => "Could you share your customer ID (for example CUST-001)?".to_string(),
        "coverage_type" => "What type of coverage would you like a quote for?".to_string(),
        "incident_type" => {
            "What happened? Was it a collision, theft, fire or water damage?".to_string()
        }
        "policy_id" => "Which policy is this about (for example POL-1001)?".to_string(),
        other => format!("Could you tell me your {}?", other.replace('_', " ")),
    }
}
