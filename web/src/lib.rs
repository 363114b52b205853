//! HTTP surface for the catalog update hub.
//!
//! Exposes the long-lived SSE endpoint that acts as the hub's connection
//! acceptor, an endpoint to publish a user's latest update, and a health check.

use hub::CancellationToken;
use log::*;
use tokio::net::TcpListener;

mod controller;
mod error;
mod extractors;
pub mod router;
mod sse;

pub use error::Error;
pub use service::AppState;

/// Bind to the configured address and serve until `shutdown` is cancelled.
///
/// Graceful shutdown waits for open SSE responses, so the caller must close the
/// hub's connections after cancelling for this future to complete.
pub async fn init_server(app_state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let listen_addr = app_state.config.listen_address();
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Server starting... listening for connections on http://{listen_addr}");

    let router = router::define_routes(app_state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
