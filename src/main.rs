//! Circuit guard
//!
//! Runs the breaker as a small reverse proxy in front of one upstream.
//!
//! ```text
//!     Client ──▶ trace ─▶ request id ─▶ circuit breaker ─▶ timeout ─▶ forward ──▶ Upstream
//!                                            │
//!                                            └─ 403 + Retry-After while open
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use circuit_guard::config::{load_config, GuardConfig};
use circuit_guard::lifecycle::{wait_for_signal, Shutdown};
use circuit_guard::observability::logging;
use circuit_guard::GuardServer;

#[derive(Parser)]
#[command(name = "circuit-guard")]
#[command(about = "Per-target circuit breaker in front of an HTTP upstream", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("circuit-guard v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        window_size = config.breaker.window_size,
        granularity = %config.breaker.granularity,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => circuit_guard::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = GuardServer::new(config)?;
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
