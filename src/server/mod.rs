//! HTTP transport for the decision engine.
//!
//! - `GET /reader` answers whether a prompt should display.
//! - `POST /reader` records a view, then answers the same question.
//! - `GET /health` is a liveness probe.
//!
//! The engine is synchronous, so handlers run it on tokio's blocking pool.

use tokio::net::TcpListener;
use tracing::info;

use crate::error::{PopgateError, Result};

pub mod app;
pub mod error;
pub mod routes;
pub mod state;

pub use app::create_app;
pub use state::ServerState;

/// Bind `addr` and serve until ctrl-c.
pub async fn run(addr: &str, state: ServerState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| PopgateError::Server(format!("bind {addr}: {err}")))?;
    serve(listener, state).await
}

/// Serve on an already-bound listener until ctrl-c.
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<()> {
    let local = listener.local_addr()?;
    info!(addr = %local, store = state.engine.store_name(), "popgate listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| PopgateError::Server(format!("serve: {err}")))?;

    info!("popgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
}
