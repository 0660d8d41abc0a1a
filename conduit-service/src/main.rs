//! Example service binary.
//!
//! Reads `.env`, installs logging, connects the configured event bus and runs
//! until Ctrl+C or SIGTERM.

use conduit_messaging::BusConfig;
use conduit_service::ExampleService;
use tokio::signal;
use tracing::{error, info};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    conduit_log::init()?;

    let config = BusConfig::from_env()?;
    info!(
        bus = %config.bus_type,
        environment = %config.environment,
        "Configuration loaded"
    );

    let service = ExampleService::start(&config).await?;

    shutdown_signal().await;

    service.shutdown().await?;
    info!("Shutdown complete");
    Ok(())
}
