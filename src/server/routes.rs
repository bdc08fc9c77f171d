//! HTTP route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ServerState>`.

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::engine::GridEngine;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub engine: GridEngine,
}

impl ServerState {
    pub fn new(engine: GridEngine) -> Self {
        Self { engine }
    }
}

pub type AppState = Arc<ServerState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    pub success: bool,
    pub timestamp: String,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolStateEntry {
    pub symbol: String,
    pub last_buy_price: Option<Decimal>,
    pub unreconciled_sold_at: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// Step every configured symbol in order, stopping at the first failure.
pub async fn run_pass(engine: &GridEngine) -> Result<Vec<String>> {
    let mut logs = Vec::new();
    for symbol in engine.symbols() {
        let report = engine.step(symbol).await?;
        logs.extend(report.logs);
    }
    Ok(logs)
}

/// ANY / and ANY /api/grid
///
/// Request method, query and body are ignored.
pub async fn run_grid(State(state): State<AppState>) -> Response {
    match run_pass(&state.engine).await {
        Ok(logs) => {
            info!(lines = logs.len(), "Grid run complete");
            let body = RunResponse {
                success: true,
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                logs,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            let details = format!("{e:#}");
            error!(error = %details, "Bot failed to run");
            let body = ErrorResponse {
                error: "Bot failed to run".to_string(),
                details,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// GET /api/state
pub async fn get_state(State(state): State<AppState>) -> Json<Vec<SymbolStateEntry>> {
    let snapshot = state.engine.store().snapshot().await;
    Json(
        snapshot
            .into_iter()
            .map(|(symbol, s)| SymbolStateEntry {
                symbol,
                last_buy_price: s.last_buy_price,
                unreconciled_sold_at: s.unreconciled_sold_at,
            })
            .collect(),
    )
}

/// DELETE /api/state/:symbol
///
/// Manual reconciliation: the symbol starts over from Uninitialized.
pub async fn reset_state(State(state): State<AppState>, Path(symbol): Path<String>) -> StatusCode {
    if state.engine.store().reset(&symbol).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
