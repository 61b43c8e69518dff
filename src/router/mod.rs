//! Request router - one chat turn end to end
//!
//! INPUT → INTENT → PLAN → EXECUTE → SYNTHESIZE → COMPLETE
//!
//! `handle` never fails. Every internal failure becomes a well-formed
//! response and the turn is still appended to the conversation.

use crate::agents::{AgentAction, AgentKind, HttpAgentTransport};
use crate::config::OrchestratorConfig;
use crate::execution::{AgentDispatcher, DispatchOutcome};
use crate::intent::IntentResolver;
use crate::llm::{LlmClient, ModelResolver};
use crate::memory::{ConversationStore, InMemoryConversationStore, Turn};
use crate::models::{
    AgentCallRecord, AttemptOutcome, Intent, IntentAnalysis, PlanBody, ResolutionMethod,
};
use crate::planner::{ExecutionPlanner, SessionContext};
use crate::synthesis::{questions_reply, ResponseSynthesizer, APOLOGY_REPLY};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub detail: Value,
}

/// Per-step call accounting as reported to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCall {
    pub agent: AgentKind,
    pub action: AgentAction,
    pub resolved_action: Option<String>,
    pub attempts: usize,
    pub success: bool,
    pub latency_ms: u64,
    pub outcomes: Vec<AttemptOutcome>,
}

impl From<&AgentCallRecord> for ApiCall {
    fn from(record: &AgentCallRecord) -> Self {
        Self {
            agent: record.agent,
            action: record.action,
            resolved_action: record.resolved_action.clone(),
            attempts: record.attempt_count(),
            success: record.success,
            latency_ms: record.total_latency_ms(),
            outcomes: record.attempts.iter().map(|a| a.outcome.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: Intent,
    pub confidence: f32,
    pub conversation_id: String,
    pub thinking_steps: Vec<String>,
    pub orchestration_events: Vec<OrchestrationEvent>,
    pub api_calls: Vec<ApiCall>,
}

#[derive(Default)]
struct Trace {
    thinking_steps: Vec<String>,
    events: Vec<OrchestrationEvent>,
}

impl Trace {
    fn step(&mut self, line: impl Into<String>) {
        self.thinking_steps.push(line.into());
    }

    fn event(&mut self, event: &str, detail: Value) {
        self.events.push(OrchestrationEvent {
            event: event.to_string(),
            timestamp: Utc::now(),
            detail,
        });
    }
}

pub struct RequestRouter {
    intent_resolver: IntentResolver,
    planner: ExecutionPlanner,
    dispatcher: AgentDispatcher,
    synthesizer: ResponseSynthesizer,
    store: Arc<dyn ConversationStore>,
    history_window: usize,
}

impl RequestRouter {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        dispatcher: AgentDispatcher,
        store: Arc<dyn ConversationStore>,
        history_window: usize,
    ) -> Self {
        Self {
            intent_resolver: IntentResolver::new(llm.clone()),
            planner: ExecutionPlanner::new(),
            dispatcher,
            synthesizer: ResponseSynthesizer::new(llm),
            store,
            history_window,
        }
    }

    /// HTTP agents, the configured model and an in-memory store
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let llm: Arc<dyn LlmClient> = Arc::new(ModelResolver::from_settings(&config.llm)?);
        let transport = Arc::new(HttpAgentTransport::new(config.agent_call_timeout));
        let dispatcher = AgentDispatcher::new(
            config.agents.clone(),
            transport,
            config.retry,
            config.agent_call_timeout,
        );

        Ok(Self::new(
            llm,
            dispatcher,
            Arc::new(InMemoryConversationStore::new()),
            config.history_window,
        ))
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub async fn handle(&self, request: ChatRequest) -> ChatResponse {
        let started = Instant::now();
        let mut trace = Trace::default();

        let conversation_id = non_blank(request.conversation_id.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let customer_id = non_blank(request.customer_id.as_deref());

        info!(
            %conversation_id,
            authenticated = customer_id.is_some(),
            "Router: handling chat turn"
        );
        trace.step(format!(
            "INPUT: Message received ({} chars)",
            request.message.chars().count()
        ));

        // === INTENT ===
        let history = match self
            .store
            .recent(&conversation_id, self.history_window)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(%conversation_id, error = %e, "Could not load history, continuing without it");
                Vec::new()
            }
        };

        let analysis = self.intent_resolver.resolve(&request.message, &history).await;
        trace.step(format!(
            "INTENT: {} (confidence {:.2}, via {})",
            analysis.intent,
            analysis.confidence,
            method_label(&analysis)
        ));
        trace.event(
            "intent_resolved",
            json!({
                "intent": analysis.intent,
                "confidence": analysis.confidence,
                "method": analysis.method,
                "entities": analysis.entities,
            }),
        );

        // === PLAN → EXECUTE → SYNTHESIZE ===
        let session = SessionContext::for_customer(customer_id);
        let mut api_calls = Vec::new();

        let (response, turn) = match self.planner.plan(&analysis, &session) {
            Err(e) => {
                error!(%conversation_id, error = %e, "Planning failed");
                trace.step(format!("PLAN: Failed - {}", e));
                (
                    APOLOGY_REPLY.to_string(),
                    Turn::failed(request.message.clone(), e.to_string()),
                )
            }
            Ok(plan) => match &plan.body {
                PlanBody::Questions { questions } => {
                    trace.step(format!(
                        "PLAN: Need more information ({} question(s))",
                        questions.len()
                    ));
                    trace.event(
                        "plan_created",
                        json!({
                            "plan_id": plan.plan_id,
                            "intent": plan.intent,
                            "kind": "questions",
                            "questions": questions,
                        }),
                    );

                    let reply = questions_reply(questions);
                    (reply.clone(), Turn::completed(request.message.clone(), reply))
                }
                PlanBody::Steps { steps } => {
                    let actions: Vec<&str> = steps.iter().map(|s| s.action.as_str()).collect();
                    trace.step(format!(
                        "PLAN: {} step(s) [{}]",
                        steps.len(),
                        actions.join(" → ")
                    ));
                    trace.event(
                        "plan_created",
                        json!({
                            "plan_id": plan.plan_id,
                            "intent": plan.intent,
                            "kind": "steps",
                            "steps": actions,
                        }),
                    );

                    let outcome = self.dispatcher.execute(&plan).await;
                    record_execution(&mut trace, &outcome);
                    api_calls = outcome.records.iter().map(ApiCall::from).collect();

                    let reply = self
                        .synthesizer
                        .synthesize(&analysis, &outcome.aggregated)
                        .await;
                    trace.step(format!(
                        "SYNTHESIZE: Reply composed ({})",
                        if outcome.aggregated.is_degraded() {
                            "degraded"
                        } else {
                            "complete"
                        }
                    ));
                    trace.event(
                        "response_synthesized",
                        json!({
                            "degraded": outcome.aggregated.is_degraded(),
                            "length": reply.chars().count(),
                        }),
                    );

                    (reply.clone(), Turn::completed(request.message.clone(), reply))
                }
            },
        };

        if let Err(e) = self.store.append(&conversation_id, turn).await {
            error!(%conversation_id, error = %e, "Failed to record turn");
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        trace.step(format!("COMPLETE: Turn finished in {} ms", elapsed_ms));
        info!(
            %conversation_id,
            intent = %analysis.intent,
            elapsed_ms,
            "Router: turn complete"
        );

        ChatResponse {
            response,
            intent: analysis.intent,
            confidence: analysis.confidence,
            conversation_id,
            thinking_steps: trace.thinking_steps,
            orchestration_events: trace.events,
            api_calls,
        }
    }
}

fn record_execution(trace: &mut Trace, outcome: &DispatchOutcome) {
    for record in &outcome.records {
        let event = if record.success {
            "step_completed"
        } else {
            "step_failed"
        };
        trace.event(
            event,
            json!({
                "step": record.order,
                "agent": record.agent,
                "action": record.action,
                "attempts": record.attempt_count(),
                "latency_ms": record.total_latency_ms(),
            }),
        );
    }

    // steps that never reached an agent (unmet dependency)
    for failure in &outcome.errors {
        if outcome.records.iter().all(|r| r.order != failure.order) {
            trace.event(
                "step_failed",
                json!({
                    "step": failure.order,
                    "agent": failure.agent,
                    "action": failure.action,
                    "error": failure.error,
                }),
            );
        }
    }

    if let Some(marker) = &outcome.aggregated.degraded {
        trace.event(
            "plan_aborted",
            json!({
                "step": marker.step,
                "agent": marker.agent,
                "action": marker.action,
                "reason": marker.reason,
            }),
        );
    }

    let succeeded = outcome.records.iter().filter(|r| r.success).count();
    trace.step(format!(
        "EXECUTE: {}/{} agent call(s) succeeded{}",
        succeeded,
        outcome.records.len(),
        if outcome.aggregated.is_degraded() {
            ", plan aborted"
        } else {
            ""
        }
    ));
}

fn method_label(analysis: &IntentAnalysis) -> &'static str {
    match analysis.method {
        ResolutionMethod::Llm => "llm",
        ResolutionMethod::Rule => "rules",
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
