//! Exchange integration.
//!
//! Defines the `Exchange` trait the grid engine trades through, and the
//! Bitget spot REST implementation behind it.

pub mod bitget;
pub mod signer;

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::OrderRequest;

/// Failures talking to the exchange.
///
/// None of these are retried; they propagate unchanged to the HTTP handler.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("exchange rejected request ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    #[error("malformed exchange response: {0}")]
    MalformedResponse(String),

    #[error("failed to sign request: {0}")]
    Signing(String),

    #[error("invalid order request: {0}")]
    InvalidRequest(String),
}

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

/// Abstraction over a spot exchange: one price read, one order write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Latest traded (close) price for `symbol`.
    async fn get_ticker(&self, symbol: &str) -> ExchangeResult<Decimal>;

    /// Place a limit GTC order. Returns the exchange's raw response payload.
    async fn place_order(&self, order: &OrderRequest) -> ExchangeResult<serde_json::Value>;

    /// Exchange name for logging and identification.
    fn name(&self) -> &str;
}
