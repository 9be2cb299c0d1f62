//! # Chatgate Server
//!
//! Loads configuration and the model registry, then serves the gateway
//! until SIGINT or SIGTERM.

use chatgate::{create_router, AppState, Config, ModelRegistry};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI args and .env file
    let config = Config::parse_args();

    let registry = match ModelRegistry::load(&config.model_config_path) {
        Ok(registry) => registry,
        Err(err) => {
            error!(path = %config.model_config_path.display(), error = %err, "Failed to load model registry");
            std::process::exit(1);
        }
    };
    info!(models = registry.len(), "Model registry loaded");

    let state = AppState::new(&config, registry)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Chatgate listening on http://{}", listener.local_addr()?);
    if config.record_traffic {
        info!(dir = %config.recordings_dir.display(), "Recording traffic");
    }

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
