use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use twap_oracle::app::Oracle;
use twap_oracle::clock::SystemClock;
use twap_oracle::config::{Args, OracleConfig};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = OracleConfig::from_args(Args::parse())?;

    info!(
        version = twap_oracle::SERVICE_VERSION,
        bind = %config.bind_addr,
        grid_width = %config.grid_width,
        sample_period_ms = config.sample_period.as_millis() as u64,
        upstream = %config.feed.url,
        coin = %config.feed.coin,
        "Starting TWAP oracle"
    );

    let oracle = Oracle::new(&config, Arc::new(SystemClock));
    let app = oracle.router();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = oracle.spawn(shutdown_rx);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_tx.send_replace(true);
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }

    info!("TWAP oracle stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, gracefully stopping");
}
