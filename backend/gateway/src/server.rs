//! HTTP server startup.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::{build_router, AppState};
use crate::sweeper::{run_sweeper, SweeperConfig};

/// Bind and serve the chat API, with the stale-session sweeper running
/// alongside the request handlers.
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<AppState>,
    sweeper: SweeperConfig,
) -> Result<()> {
    tokio::spawn(run_sweeper(state.store.clone(), sweeper));

    let app = build_router(state);
    info!("Porchline chat API listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
