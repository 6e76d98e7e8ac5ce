//! Entry point for the enclave custody server.

use std::sync::Arc;

use anyhow::Result;
use custody_enclave::EnclaveSupervisor;
use custody_orchestrator::{
    terminate_on_startup_failure, InitOptions, RealHostLimits, ServerOrchestrator,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let options = InitOptions::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.clone()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        simulation = options.enclave.simulation,
        workers = options.num_workers,
        "starting enclave custody server"
    );

    let supervisor = Arc::new(EnclaveSupervisor::simulated(options.enclave.clone()));
    let orchestrator = Arc::new(ServerOrchestrator::new(
        options,
        supervisor,
        Box::new(RealHostLimits),
    ));

    if let Err(e) = orchestrator.init_all().await {
        terminate_on_startup_failure(&e);
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    orchestrator.exit_all().await;

    Ok(())
}
