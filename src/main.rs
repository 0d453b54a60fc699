use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use nutridb::config::Settings;
use nutridb::database::{DatabaseManager, ManagerConfig};
use nutridb::postgres::PostgresConnector;
use nutridb::server::{create_app, AppState};
use nutridb::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing; keep the guard alive until exit
    let _telemetry = init_telemetry(&settings.logging, &settings.otel)?;
    tracing::info!(database = ?settings.database, "Configuration loaded");

    // Open primary (and replica, if configured)
    let manager = DatabaseManager::open(ManagerConfig::from(&settings), &PostgresConnector).await?;

    // Create Axum app
    let app = create_app(AppState::new(manager.clone()));

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Operations API listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    manager.close().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
