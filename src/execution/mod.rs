//! Agent dispatch
//!
//! Runs plan steps strictly in order against the registered agents.
//! Every attempt opens a fresh connection; the first use of an agent
//! triggers skill discovery, cached for the life of the process.

use crate::agents::{
    AgentAction, AgentChannel, AgentEndpoint, AgentKind, AgentRegistry, AgentTransport,
    SkillCatalog, TaskEnvelope,
};
use crate::config::RetryPolicy;
use crate::error::OrchestrationError;
use crate::models::{
    AgentCallRecord, AggregatedResults, AttemptOutcome, AttemptRecord, Criticality,
    DegradedMarker, ExecutionPlan, ExecutionStatus, ExecutionStep, StepResult,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A step that did not succeed
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub order: u32,
    pub agent: AgentKind,
    pub action: AgentAction,
    pub criticality: Criticality,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    pub aggregated: AggregatedResults,
    pub errors: Vec<StepFailure>,
    pub records: Vec<AgentCallRecord>,
}

struct AttemptFailure {
    outcome: AttemptOutcome,
    error: OrchestrationError,
}

impl AttemptFailure {
    fn new(outcome: AttemptOutcome, error: OrchestrationError) -> Self {
        Self { outcome, error }
    }
}

/// Wire-name candidates for an action, in lookup order
pub fn name_variants(agent: AgentKind, action: AgentAction) -> [String; 3] {
    [
        action.as_str().to_string(),
        format!("{}.{}", agent.name(), action.as_str()),
        format!("{}_{}", agent.name(), action.as_str()),
    ]
}

/// First variant present in the catalog
pub fn resolve_action_name(
    catalog: &SkillCatalog,
    agent: AgentKind,
    action: AgentAction,
) -> crate::Result<String> {
    let variants = name_variants(agent, action);
    variants
        .iter()
        .find(|name| catalog.contains(name))
        .cloned()
        .ok_or_else(|| OrchestrationError::ActionUnresolved {
            agent: agent.to_string(),
            action: action.to_string(),
            tried: variants.to_vec(),
        })
}

pub struct AgentDispatcher {
    registry: AgentRegistry,
    transport: Arc<dyn AgentTransport>,
    retry: RetryPolicy,
    call_timeout: Duration,
    /// Never invalidated
    catalogs: RwLock<HashMap<AgentKind, Arc<SkillCatalog>>>,
}

impl AgentDispatcher {
    pub fn new(
        registry: AgentRegistry,
        transport: Arc<dyn AgentTransport>,
        retry: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            retry,
            call_timeout,
            catalogs: RwLock::new(HashMap::new()),
        }
    }

    /// Execute all steps in declared order. Never fails; failures are
    /// reported in the outcome.
    pub async fn execute(&self, plan: &ExecutionPlan) -> DispatchOutcome {
        let steps = plan.step_list();
        let mut outcome = DispatchOutcome::default();
        let mut step_outputs: HashMap<u32, Value> = HashMap::with_capacity(steps.len());

        debug!(plan_id = %plan.plan_id, step_count = steps.len(), "Starting plan execution");

        for (index, step) in steps.iter().enumerate() {
            let mut params = step.params.clone();

            // -------------------------------------------------
            // 1️⃣ DEPENDENCY RESOLUTION
            // -------------------------------------------------
            if let Some(dep) = &step.depends_on {
                let resolved = step_outputs
                    .get(&dep.step)
                    .and_then(|data| data.pointer(&dep.pointer))
                    .filter(|v| !v.is_null())
                    .cloned();

                match resolved {
                    Some(value) => {
                        params.insert(dep.param.clone(), value);
                    }
                    None => {
                        let reason = format!(
                            "dependency {} from step {} ({}) unavailable",
                            dep.param, dep.step, dep.pointer
                        );
                        warn!(step_order = step.order, %reason, "Skipping step");

                        outcome.aggregated.insert(
                            step.key(),
                            step_result(step, ExecutionStatus::Skipped, None, Some(reason.clone())),
                        );
                        outcome.errors.push(failure(step, reason.clone()));

                        if step.criticality == Criticality::Required {
                            self.abort(&mut outcome, step, reason, &steps[index + 1..]);
                            break;
                        }
                        continue;
                    }
                }
            }

            // -------------------------------------------------
            // 2️⃣ DISPATCH WITH RETRIES
            // -------------------------------------------------
            let (result, record) = self.dispatch_step(step, params).await;
            outcome.records.push(record);

            match result {
                Ok(data) => {
                    step_outputs.insert(step.order, data.clone());
                    outcome.aggregated.insert(
                        step.key(),
                        step_result(step, ExecutionStatus::Success, Some(data), None),
                    );
                }
                Err(error) => {
                    let reason = error.to_string();
                    outcome.aggregated.insert(
                        step.key(),
                        step_result(step, ExecutionStatus::Failed, None, Some(reason.clone())),
                    );
                    outcome.errors.push(failure(step, reason.clone()));

                    // -------------------------------------------------
                    // 3️⃣ REQUIRED STEPS ABORT, BEST-EFFORT STEPS DON'T
                    // -------------------------------------------------
                    if step.criticality == Criticality::Required {
                        self.abort(&mut outcome, step, reason, &steps[index + 1..]);
                        break;
                    }

                    warn!(
                        step_order = step.order,
                        action = %step.action,
                        error = %reason,
                        "Best-effort step failed, continuing"
                    );
                }
            }
        }

        debug!(
            plan_id = %plan.plan_id,
            errors = outcome.errors.len(),
            degraded = outcome.aggregated.is_degraded(),
            "Plan execution completed"
        );

        outcome
    }

    fn abort(
        &self,
        outcome: &mut DispatchOutcome,
        step: &ExecutionStep,
        reason: String,
        remaining: &[ExecutionStep],
    ) {
        warn!(
            step_order = step.order,
            agent = %step.agent(),
            action = %step.action,
            error = %reason,
            "Required step failed, aborting plan"
        );

        outcome.aggregated.degraded = Some(DegradedMarker {
            step: step.order,
            agent: step.agent(),
            action: step.action,
            reason,
        });

        for skipped in remaining {
            outcome.aggregated.insert(
                skipped.key(),
                step_result(
                    skipped,
                    ExecutionStatus::Skipped,
                    None,
                    Some(format!("aborted after step {} failed", step.order)),
                ),
            );
        }
    }

    async fn dispatch_step(
        &self,
        step: &ExecutionStep,
        params: Map<String, Value>,
    ) -> (crate::Result<Value>, AgentCallRecord) {
        let agent = step.agent();
        let mut record = AgentCallRecord {
            order: step.order,
            agent,
            action: step.action,
            resolved_action: None,
            attempts: Vec::new(),
            success: false,
        };

        let Some(endpoint) = self.registry.get(agent) else {
            let error = OrchestrationError::Config(format!("agent {} is not registered", agent));
            return (Err(error), record);
        };

        let max_attempts = step.max_retries.unwrap_or(self.retry.max_retries) + 1;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let started = Instant::now();
            let result = self
                .attempt(endpoint, step.action, &params, &mut record.resolved_action)
                .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(data) => {
                    record.attempts.push(AttemptRecord {
                        attempt,
                        latency_ms,
                        outcome: AttemptOutcome::Success,
                    });
                    record.success = true;
                    info!(
                        %agent,
                        action = %step.action,
                        attempt,
                        latency_ms,
                        "Agent call succeeded"
                    );
                    return (Ok(data), record);
                }
                Err(AttemptFailure { outcome, error }) => {
                    record.attempts.push(AttemptRecord {
                        attempt,
                        latency_ms,
                        outcome,
                    });

                    let retryable = error.is_retryable();
                    warn!(
                        %agent,
                        action = %step.action,
                        attempt,
                        max_attempts,
                        retryable,
                        error = %error,
                        "Agent call failed"
                    );
                    last_error = Some(error);

                    if !retryable {
                        break;
                    }
                    if attempt < max_attempts {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| OrchestrationError::AgentUnavailable {
            agent: agent.to_string(),
            reason: "no attempts made".to_string(),
        });
        (Err(error), record)
    }

    /// One connect → discover (first time only) → resolve → invoke cycle
    async fn attempt(
        &self,
        endpoint: &AgentEndpoint,
        action: AgentAction,
        params: &Map<String, Value>,
        resolved_action: &mut Option<String>,
    ) -> std::result::Result<Value, AttemptFailure> {
        let channel = self
            .transport
            .connect(endpoint)
            .await
            .map_err(|e| AttemptFailure::new(AttemptOutcome::TransportError(e.to_string()), e))?;

        let catalog = self
            .catalog_for(endpoint.kind, channel.as_ref())
            .await
            .map_err(|e| AttemptFailure::new(AttemptOutcome::DiscoveryFailed(e.to_string()), e))?;

        let name = resolve_action_name(&catalog, endpoint.kind, action)
            .map_err(|e| AttemptFailure::new(AttemptOutcome::Unresolved(e.to_string()), e))?;
        *resolved_action = Some(name.clone());

        let envelope = TaskEnvelope {
            action: name,
            params: params.clone(),
        };

        let reply = match tokio::time::timeout(self.call_timeout, channel.invoke(&envelope)).await {
            Ok(reply) => reply
                .map_err(|e| AttemptFailure::new(AttemptOutcome::TransportError(e.to_string()), e))?,
            Err(_) => {
                return Err(AttemptFailure::new(
                    AttemptOutcome::Timeout,
                    OrchestrationError::AgentTimeout {
                        agent: endpoint.kind.to_string(),
                        timeout_ms: self.call_timeout.as_millis() as u64,
                    },
                ))
            }
        };

        if !reply.success {
            let reason = reply
                .error
                .unwrap_or_else(|| "agent reported failure without detail".to_string());
            return Err(AttemptFailure::new(
                AttemptOutcome::Rejected(reason.clone()),
                OrchestrationError::AgentReply {
                    agent: endpoint.kind.to_string(),
                    reason,
                },
            ));
        }

        Ok(reply.data.unwrap_or(Value::Null))
    }

    async fn catalog_for(
        &self,
        kind: AgentKind,
        channel: &dyn AgentChannel,
    ) -> crate::Result<Arc<SkillCatalog>> {
        if let Some(catalog) = self.catalogs.read().await.get(&kind) {
            return Ok(catalog.clone());
        }

        let catalog = match tokio::time::timeout(self.call_timeout, channel.discover()).await {
            Ok(result) => Arc::new(result?),
            Err(_) => {
                return Err(OrchestrationError::AgentTimeout {
                    agent: kind.to_string(),
                    timeout_ms: self.call_timeout.as_millis() as u64,
                })
            }
        };

        info!(agent = %kind, skills = catalog.skills.len(), "Skill catalog discovered");
        self.catalogs.write().await.insert(kind, catalog.clone());
        Ok(catalog)
    }
}

fn step_result(
    step: &ExecutionStep,
    status: ExecutionStatus,
    data: Option<Value>,
    error: Option<String>,
) -> StepResult {
    StepResult {
        order: step.order,
        agent: step.agent(),
        action: step.action,
        criticality: step.criticality,
        status,
        data,
        error,
    }
}

fn failure(step: &ExecutionStep, error: String) -> StepFailure {
    StepFailure {
        order: step.order,
        agent: step.agent(),
        action: step.action,
        criticality: step.criticality,
        error,
    }
}
