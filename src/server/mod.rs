//! HTTP server. Axum router wrapping the grid handler plus a couple of
//! operational routes. CORS enabled.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::header,
    routing::{any, delete, get},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::{AppState, ServerState};

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", any(routes::run_grid))
        .route("/api/grid", any(routes::run_grid))
        .route("/api/state", get(routes::get_state))
        .route("/api/state/:symbol", delete(routes::reset_state))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped or `ctrl_c` arrives.
pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "Grid bot listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received.");
        })
        .await
        .context("HTTP server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
