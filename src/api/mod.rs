//! HTTP surface for polling clients (driver app, admin dashboard).
//!
//! Routes are nested under `/api/`.

pub mod error;
pub mod routes;

use anyhow::Result;
use axum::routing::{delete, get, post};
use axum::Router;
use tracing::info;

use crate::engine::Dispatcher;

pub fn router(dispatcher: Dispatcher) -> Router {
    // NOTE: `:param` path syntax (axum 0.7). `/alerts/history` is static and
    // wins over `/alerts/:id`.
    let api = Router::new()
        .route("/health", get(routes::health))
        .route("/alerts", get(routes::poll).post(routes::submit_alert))
        .route("/alerts/history", get(routes::history))
        .route("/alerts/:id", get(routes::alert))
        .route("/alerts/:id/actions", post(routes::submit_action))
        .route("/consumers/:consumer", delete(routes::forget_consumer))
        .route(
            "/operator/availability",
            get(routes::operator_availability).put(routes::set_operator_availability),
        )
        .route(
            "/simulation",
            get(routes::simulation).put(routes::set_simulation),
        )
        .with_state(dispatcher);

    Router::new().nest("/api", api)
}

/// Serves until Ctrl-C.
pub async fn serve(bind: &str, dispatcher: Dispatcher) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("HTTP API listening on {}", listener.local_addr()?);

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
