//! HTTP Gateway
//!
//! REST surface over the account and transfer services.
//!
//! | Method | Path                               | Success          |
//! |--------|------------------------------------|------------------|
//! | POST   | `/api/accounts`                    | created account  |
//! | GET    | `/api/accounts/{id}`               | account          |
//! | POST   | `/api/transfers`                   | PENDING transfer |
//! | GET    | `/api/transfers/{id}`              | transfer         |
//! | GET    | `/api/transfers/by-account/{id}`   | transfer list    |
//! | GET    | `/api/health`                      | health           |

pub mod handlers;
pub mod state;
pub mod types;

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::info;

pub use state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        // Accounts
        .route("/api/accounts", post(handlers::create_account))
        .route("/api/accounts/{id}", get(handlers::get_account))
        // Transfers
        .route("/api/transfers", post(handlers::create_transfer))
        .route("/api/transfers/{id}", get(handlers::get_transfer))
        .route(
            "/api/transfers/by-account/{id}",
            get(handlers::get_transfers_by_account),
        )
        .with_state(state)
}

/// Serve the gateway on `listener` until `shutdown` resolves
pub async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Gateway stopped");
    Ok(())
}
