//! Sentinel gateway.
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!   GET /shield     │  kill switch ─▶ identity ─▶ tier ─▶ breaker(limiter) │
//!   X-API-Key ─────▶│       │             │                    │           │
//!                   │       ▼             ▼                    ▼           │
//!                   │   ┌───────────────────────────┐   ┌─────────────┐    │
//!                   │   │ shared store (Redis)      │   │  Postgres   │    │
//!                   │   │ auth: tier: limiter: flag │   │  users      │    │
//!                   │   └───────────────────────────┘   └─────────────┘    │
//!                   │                                                      │
//!   ◀───────────────│  any fault ─▶ fail-open (200 degraded)               │
//!                   └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use sentinel_gateway::admin::setup_admin_router;
use sentinel_gateway::config::{load_config, load_from_env};
use sentinel_gateway::lifecycle::{bind, build_state, signals, Shutdown};
use sentinel_gateway::observability::{logging, metrics};
use sentinel_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "sentinel-gateway", version, about = "API-key access-control gateway")]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sentinel-gateway starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let state = build_state(config.clone()).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        let router = setup_admin_router(state.clone());
        let stop = shutdown.wait();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(stop).await {
                tracing::error!(error = %e, "Admin API server failed");
            }
        });
    }

    let listener = bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(state);
    server.run(listener, shutdown.wait()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
