//! HTTP transport for technical agents
//!
//! Each `connect` builds its own client with idle pooling disabled, so a
//! retry never rides on a socket that was part of the previous failure.

use super::{AgentChannel, AgentEndpoint, AgentReply, AgentTransport, SkillCatalog, TaskEnvelope};
use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const DISCOVERY_PATH: &str = "/.well-known/agent.json";
const TASK_PATH: &str = "/tasks/send";

pub struct HttpAgentTransport {
    request_timeout: Duration,
}

impl HttpAgentTransport {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for HttpAgentTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn connect(&self, endpoint: &AgentEndpoint) -> Result<Box<dyn AgentChannel>> {
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| OrchestrationError::AgentUnavailable {
                agent: endpoint.kind.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Box::new(HttpAgentChannel {
            client,
            endpoint: endpoint.clone(),
        }))
    }
}

struct HttpAgentChannel {
    client: Client,
    endpoint: AgentEndpoint,
}

impl HttpAgentChannel {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.base_url, path)
    }

    fn unavailable(&self, reason: String) -> OrchestrationError {
        OrchestrationError::AgentUnavailable {
            agent: self.endpoint.kind.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl AgentChannel for HttpAgentChannel {
    async fn discover(&self) -> Result<SkillCatalog> {
        let url = self.url(DISCOVERY_PATH);
        debug!(agent = %self.endpoint.kind, %url, "Discovering agent skills");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.unavailable(format!("discovery request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("discovery returned {}", status)));
        }

        response
            .json::<SkillCatalog>()
            .await
            .map_err(|e| self.unavailable(format!("invalid skill catalog: {}", e)))
    }

    async fn invoke(&self, envelope: &TaskEnvelope) -> Result<AgentReply> {
        let url = self.url(TASK_PATH);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(envelope)
            .send()
            .await
            .map_err(|e| {
                self.unavailable(format!("task request for {} failed: {}", envelope.action, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestrationError::AgentReply {
                agent: self.endpoint.kind.to_string(),
                reason: format!("HTTP {} for {}: {}", status, envelope.action, body),
            });
        }

        response
            .json::<AgentReply>()
            .await
            .map_err(|e| OrchestrationError::AgentReply {
                agent: self.endpoint.kind.to_string(),
                reason: format!("invalid reply envelope: {}", e),
            })
    }
}
