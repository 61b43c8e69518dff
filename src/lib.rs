//! Insurance Agent Orchestrator
//!
//! Routes a customer's chat message through:
//! - intent resolution (LLM first, keyword rules as fallback)
//! - deterministic planning against the policy, claims and risk agents
//! - sequential dispatch with skill discovery and bounded retries
//! - response synthesis (LLM first, templated fallback)
//!
//! UNIFIED LOOP:
//! INPUT → INTENT → PLAN → EXECUTE → SYNTHESIZE → COMPLETE

pub mod agents;
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod models;
pub mod planner;
pub mod router;
pub mod synthesis;

pub use error::Result;

// Re-export common types
pub use config::OrchestratorConfig;
pub use models::*;
pub use router::{ChatRequest, ChatResponse, RequestRouter};
