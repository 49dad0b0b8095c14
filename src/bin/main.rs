use liquidity_collision_agent::{AgentConfig, CollisionAgent, HttpBackend};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let Some(org_id) = std::env::args().nth(1) else {
        eprintln!("usage: collision-agent <org_id>");
        return ExitCode::from(2);
    };

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let backend = match HttpBackend::new(&config.backend) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP backend");
            return ExitCode::FAILURE;
        }
    };

    info!(
        org_id = %org_id,
        base_url = %backend.base_url(),
        "Liquidity collision agent starting"
    );

    let agent = CollisionAgent::new(Arc::new(backend), config);
    let report = agent.detect_collisions(&org_id).await;

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!(error = %e, "Failed to serialize report");
            return ExitCode::FAILURE;
        }
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
