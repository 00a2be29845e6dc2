//! Money Transfer service
//!
//! ```text
//! ┌──────────┐  submit   ┌─────────────┐  oldest-N  ┌───────────┐  txn  ┌─────────┐
//! │ Gateway  │─────────▶ │ MemoryStore │ ─────────▶ │ Processor │ ────▶ │ Applier │
//! │ (axum)   │ ◀──────── │  (ledger)   │ ◀──────────────────────────────│         │
//! └──────────┘  lookups  └─────────────┘        commit                  └─────────┘
//! ```
//!
//! Usage: `money_transfer [--env <name>] [--port <port>]`

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use money_transfer::config::AppConfig;
use money_transfer::gateway::{self, AppState};
use money_transfer::store::{LedgerStore, MemoryStore};
use money_transfer::transfer::{TransferApplier, TransferProcessor};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = money_transfer::logging::init_logging(&app_config);

    tracing::info!(env = %env, version = env!("GIT_HASH"), "Starting money transfer service");

    let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());

    // Background processor drains the pending collection
    let applier = Arc::new(TransferApplier::new(Arc::clone(&store)));
    let processor =
        TransferProcessor::start(applier, app_config.processor.to_processor_config());

    let state = Arc::new(AppState::new(store).with_processor_stats(processor.shared_stats()));

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    let addr = format!("{}:{}", app_config.gateway.host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let served = gateway::run_server(listener, state, shutdown_signal()).await;

    processor.stop().await;
    served.context("Gateway server error")?;

    tracing::info!("Money transfer service stopped");
    Ok(())
}
