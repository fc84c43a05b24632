//! # fleet
//!
//! Fleet hub binary — starts the HTTP/WebSocket server and runs until
//! interrupted.

#![deny(unsafe_code)]

use std::time::Duration;

use clap::Parser;
use fleet_server::ServerConfig;

/// Fleet management hub.
#[derive(Parser, Debug)]
#[command(name = "fleet", about = "Fleet management hub")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8765")]
    port: u16,

    /// Command timeout in seconds.
    #[arg(long, default_value = "30")]
    command_timeout: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        command_timeout_secs: cli.command_timeout,
        ..ServerConfig::default()
    };

    let handle = match fleet_server::start(config).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    tracing::info!(port = handle.port, "fleet hub ready");

    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to listen for ctrl+c");
    }

    tracing::info!("shutting down");
    handle
        .shutdown
        .graceful_shutdown(Duration::from_secs(10))
        .await;
}
