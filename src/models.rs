//! Core data models for the orchestrator

use crate::agents::{AgentAction, AgentKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Intent =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    HealthCheck,
    PolicyInquiry,
    QuoteRequest,
    ClaimStatus,
    ClaimFiling,
    GeneralInquiry,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::HealthCheck,
        Intent::PolicyInquiry,
        Intent::QuoteRequest,
        Intent::ClaimStatus,
        Intent::ClaimFiling,
        Intent::GeneralInquiry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::HealthCheck => "health_check",
            Intent::PolicyInquiry => "policy_inquiry",
            Intent::QuoteRequest => "quote_request",
            Intent::ClaimStatus => "claim_status",
            Intent::ClaimFiling => "claim_filing",
            Intent::GeneralInquiry => "general_inquiry",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Intent::ALL
            .iter()
            .find(|intent| intent.as_str() == normalized)
            .copied()
            .ok_or_else(|| format!("unknown intent '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMethod {
    Llm,
    Rule,
}

/// Classification of one user message. Request-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub intent: Intent,
    /// Always within [0.0, 1.0]
    pub confidence: f32,
    pub entities: HashMap<String, String>,
    pub method: ResolutionMethod,
}

impl IntentAnalysis {
    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities
            .get(name)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

//
// ================= Plan =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Required,
    BestEffort,
}

/// Fills `param` from a field of an earlier step's result data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepDependency {
    /// `order` of the earlier step
    pub step: u32,
    /// JSON pointer into that step's `data`, e.g. `/policies/0/policy_id`
    pub pointer: String,
    pub param: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub order: u32,
    pub action: AgentAction,
    pub params: Map<String, Value>,
    #[serde(default)]
    pub depends_on: Option<StepDependency>,
    pub criticality: Criticality,
    /// Overrides the dispatcher's retry count for this step
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl ExecutionStep {
    pub fn agent(&self) -> AgentKind {
        self.action.agent()
    }

    /// Key under which the step's result is aggregated
    pub fn key(&self) -> String {
        self.action.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanBody {
    Steps { steps: Vec<ExecutionStep> },
    /// Terminal information-gathering plan
    Questions { questions: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub plan_id: Uuid,
    pub intent: Intent,
    pub body: PlanBody,
}

impl ExecutionPlan {
    pub fn steps(intent: Intent, steps: Vec<ExecutionStep>) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            intent,
            body: PlanBody::Steps { steps },
        }
    }

    pub fn questions(intent: Intent, questions: Vec<String>) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            intent,
            body: PlanBody::Questions { questions },
        }
    }

    pub fn step_list(&self) -> &[ExecutionStep] {
        match &self.body {
            PlanBody::Steps { steps } => steps,
            PlanBody::Questions { .. } => &[],
        }
    }

    pub fn is_information_gathering(&self) -> bool {
        matches!(self.body, PlanBody::Questions { .. })
    }
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub order: u32,
    pub agent: AgentKind,
    pub action: AgentAction,
    pub criticality: Criticality,
    pub status: ExecutionStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl StepResult {
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    DiscoveryFailed(String),
    Unresolved(String),
    TransportError(String),
    Timeout,
    Rejected(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub latency_ms: u64,
    pub outcome: AttemptOutcome,
}

/// Retry accounting for one step. Observability only, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCallRecord {
    pub order: u32,
    pub agent: AgentKind,
    pub action: AgentAction,
    pub resolved_action: Option<String>,
    pub attempts: Vec<AttemptRecord>,
    pub success: bool,
}

impl AgentCallRecord {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn total_latency_ms(&self) -> u64 {
        self.attempts.iter().map(|a| a.latency_ms).sum()
    }
}

/// A required step failed; the rest of the plan was abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedMarker {
    pub step: u32,
    pub agent: AgentKind,
    pub action: AgentAction,
    pub reason: String,
}

/// All step results of one plan, keyed by action name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatedResults {
    pub results: BTreeMap<String, StepResult>,
    pub degraded: Option<DegradedMarker>,
}

impl AggregatedResults {
    pub fn insert(&mut self, key: String, result: StepResult) {
        self.results.insert(key, result);
    }

    /// Data of a successful step, if any
    pub fn data_for(&self, action: AgentAction) -> Option<&Value> {
        self.results
            .get(action.as_str())
            .filter(|r| r.succeeded())
            .and_then(|r| r.data.as_ref())
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.results.values().filter(|r| !r.succeeded())
    }

    /// Successful data only, as one JSON object for prompts
    pub fn successful_data(&self) -> Value {
        let mut map = Map::new();
        for (key, result) in &self.results {
            if let (true, Some(data)) = (result.succeeded(), result.data.as_ref()) {
                map.insert(key.clone(), data.clone());
            }
        }
        Value::Object(map)
    }
}
