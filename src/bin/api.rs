use insurance_agent_orchestrator::{
    api::start_server, config::OrchestratorConfig, router::RequestRouter,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = OrchestratorConfig::from_env()?;

    info!("🚀 Insurance Agent Orchestrator - API Server");
    info!("📍 Port: {}", config.port);
    for endpoint in config.agents.list() {
        info!("🔗 {} → {}", endpoint.kind, endpoint.base_url);
    }

    let router = RequestRouter::from_config(&config)?;

    if config.llm.gateway.is_none()
        && config.llm.openai_api_key.is_none()
        && config.llm.gemini_api_key.is_none()
    {
        eprintln!("⚠️  No LLM credentials set in .env, running in demo mode");
    }

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(Arc::new(router), config.port).await?;

    Ok(())
}
