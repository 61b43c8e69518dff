//! Technical agent registry and transport seam
//!
//! Every downstream agent and every action it offers is a closed enum,
//! bound at compile time. The remote skill catalog only decides which
//! wire name an action is invoked under.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

pub mod http;
pub use http::HttpAgentTransport;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentKind {
    #[serde(rename = "policy_agent")]
    Policy,
    #[serde(rename = "claims_agent")]
    Claims,
    #[serde(rename = "risk_agent")]
    Risk,
}

impl AgentKind {
    pub const ALL: [AgentKind; 3] = [AgentKind::Policy, AgentKind::Claims, AgentKind::Risk];

    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Policy => "policy_agent",
            AgentKind::Claims => "claims_agent",
            AgentKind::Risk => "risk_agent",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    GetCustomerPolicies,
    GetPolicyDetails,
    GenerateQuote,
    GetClaimsHistory,
    GetClaimStatus,
    FileClaim,
    AssessCustomerRisk,
    ScoreClaim,
}

impl AgentAction {
    pub fn agent(&self) -> AgentKind {
        match self {
            AgentAction::GetCustomerPolicies
            | AgentAction::GetPolicyDetails
            | AgentAction::GenerateQuote => AgentKind::Policy,
            AgentAction::GetClaimsHistory
            | AgentAction::GetClaimStatus
            | AgentAction::FileClaim => AgentKind::Claims,
            AgentAction::AssessCustomerRisk | AgentAction::ScoreClaim => AgentKind::Risk,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentAction::GetCustomerPolicies => "get_customer_policies",
            AgentAction::GetPolicyDetails => "get_policy_details",
            AgentAction::GenerateQuote => "generate_quote",
            AgentAction::GetClaimsHistory => "get_claims_history",
            AgentAction::GetClaimStatus => "get_claim_status",
            AgentAction::FileClaim => "file_claim",
            AgentAction::AssessCustomerRisk => "assess_customer_risk",
            AgentAction::ScoreClaim => "score_claim",
        }
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a technical agent listens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEndpoint {
    pub kind: AgentKind,
    pub base_url: String,
}

/// Static agent registry, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    endpoints: HashMap<AgentKind, AgentEndpoint>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            endpoints: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: AgentKind, base_url: impl Into<String>) {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        self.endpoints
            .insert(kind, AgentEndpoint { kind, base_url });
    }

    pub fn get(&self, kind: AgentKind) -> Option<&AgentEndpoint> {
        self.endpoints.get(&kind)
    }

    pub fn list(&self) -> Vec<&AgentEndpoint> {
        let mut endpoints: Vec<_> = self.endpoints.values().collect();
        endpoints.sort_by_key(|e| e.kind);
        endpoints
    }
}

/// Outbound task: `{action, ...params}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEnvelope {
    pub action: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Reply: `{success, data?, error?}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentReply {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AgentReply {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Skills an agent advertises through discovery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillCatalog {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub skills: Vec<SkillDescriptor>,
}

impl SkillCatalog {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            skills: names
                .into_iter()
                .map(|name| SkillDescriptor {
                    name: name.into(),
                    description: None,
                })
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.iter().any(|s| s.name == name)
    }
}

/// Opens a connection to an agent. Called once per attempt.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn connect(&self, endpoint: &AgentEndpoint) -> Result<Box<dyn AgentChannel>>;
}

/// One live connection to an agent
#[async_trait]
pub trait AgentChannel: Send + Sync {
    async fn discover(&self) -> Result<SkillCatalog>;
    async fn invoke(&self, envelope: &TaskEnvelope) -> Result<AgentReply>;
}
