use insurance_agent_orchestrator::{
    config::OrchestratorConfig,
    router::{ChatRequest, RequestRouter},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing (stderr, so stdout stays pure JSON)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let message = args
        .next()
        .unwrap_or_else(|| "Give me an overview of my account".to_string());
    let customer_id = args.next().or_else(|| Some("CUST-001".to_string()));

    info!("Insurance Agent Orchestrator starting");

    let config = OrchestratorConfig::from_env()?;
    let router = RequestRouter::from_config(&config)?;

    info!(message = %message, customer_id = ?customer_id, "Running single turn");

    let response = router
        .handle(ChatRequest {
            message,
            customer_id,
            conversation_id: None,
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(())
}
