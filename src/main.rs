use greetd::config::{greeting_from_env, ServerConfig};
use greetd::server::{shutdown_channel, wait_for_signal, HealthError, Supervisor};
use greetd::service::GreetingService;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting greetd");

    let config = ServerConfig::from_env()?;
    let greeting = greeting_from_env();
    info!(
        addr = %config.socket_addr(),
        shutdown_timeout = ?config.shutdown_timeout,
        greeting = %greeting,
        "Configuration loaded"
    );

    // Create shutdown channel for coordinated shutdown
    let (shutdown_controller, shutdown_signal) = shutdown_channel();

    let service = Arc::new(GreetingService::new(greeting));
    let supervisor = Supervisor::for_service(config, service);
    let handle = supervisor.run(shutdown_signal).await?;

    // A bind failure is only visible through health
    match supervisor.health_check() {
        Ok(()) => info!("Server healthy"),
        Err(e @ HealthError::RunFailure(_)) => {
            error!(error = %e, "Server failed to start");
            return Err(e.into());
        }
        Err(e) => warn!(error = %e, "Server not healthy yet"),
    }

    let signal = wait_for_signal().await;
    info!(signal = signal, "Initiating graceful shutdown");
    shutdown_controller.shutdown();

    if let Err(e) = handle.wait().await {
        warn!(error = %e, "Shutdown finished with errors");
    }

    info!(outcome = ?supervisor.run_outcome(), "greetd shut down");
    Ok(())
}
