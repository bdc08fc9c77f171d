//! Bitget spot REST integration.
//!
//! API docs: https://bitgetlimited.github.io/apidoc/en/spot/
//! Base URL: https://api.bitget.com
//! Auth: not required for market data; `ACCESS-*` signed headers for trading
//! (see `signer`).
//!
//! Every Bitget response is wrapped in `{ code, msg, data }` where
//! `code == "00000"` means success.

use async_trait::async_trait;
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use super::signer::RequestSigner;
use super::{Exchange, ExchangeError, ExchangeResult};
use crate::config::Credentials;
use crate::types::OrderRequest;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.bitget.com";
const TICKER_PATH: &str = "/api/spot/v1/market/ticker";
const ORDERS_PATH: &str = "/api/spot/v1/trade/orders";
const EXCHANGE_NAME: &str = "bitget";
const SUCCESS_CODE: &str = "00000";

// ---------------------------------------------------------------------------
// API types (Bitget JSON <-> Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    #[serde(default)]
    data: Option<TickerData>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    /// Last traded price as a decimal string.
    #[serde(default)]
    close: Option<String>,
}

/// Body of `POST /api/spot/v1/trade/orders`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrderBody<'a> {
    symbol: &'a str,
    side: &'static str,
    order_type: &'static str,
    force: &'static str,
    price: String,
    size: String,
}

impl<'a> From<&'a OrderRequest> for PlaceOrderBody<'a> {
    fn from(order: &'a OrderRequest) -> Self {
        Self {
            symbol: &order.symbol,
            side: order.side.as_str(),
            order_type: "limit",
            force: "gtc",
            price: order.price.to_string(),
            size: order.size.to_string(),
        }
    }
}

fn invalid_order_body(e: serde_json::Error) -> ExchangeError {
    ExchangeError::InvalidRequest(format!("order body: {e}"))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Bitget spot client.
pub struct BitgetClient {
    http: Client,
    base_url: String,
    signer: RequestSigner,
}

impl BitgetClient {
    /// Create a client against `base_url` (no trailing slash needed).
    pub fn new(base_url: &str, credentials: Credentials) -> ExchangeResult<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("GRIDBOT/0.1.0 (bitget-grid-bot)")
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer: RequestSigner::new(credentials),
        })
    }

    /// Read the body and turn a non-2xx status into `Rejected`.
    async fn read_body(resp: reqwest::Response) -> ExchangeResult<String> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ExchangeError::Rejected { status, body });
        }
        Ok(body)
    }

    fn encode_order(order: &OrderRequest) -> ExchangeResult<String> {
        serde_json::to_string(&PlaceOrderBody::from(order)).map_err(invalid_order_body)
    }

    fn parse_close(body: &str) -> ExchangeResult<Decimal> {
        let envelope: TickerEnvelope = serde_json::from_str(body)
            .map_err(|e| ExchangeError::MalformedResponse(format!("ticker body: {e}")))?;

        let close = envelope
            .data
            .and_then(|d| d.close)
            .ok_or_else(|| ExchangeError::MalformedResponse("ticker missing data.close".into()))?;

        let price = Decimal::from_str(close.trim())
            .or_else(|_| Decimal::from_scientific(close.trim()))
            .map_err(|_| ExchangeError::MalformedResponse(format!("unparseable close {close:?}")))?;

        if price <= Decimal::ZERO {
            return Err(ExchangeError::MalformedResponse(format!(
                "non-positive close {price}"
            )));
        }
        Ok(price)
    }
}

#[async_trait]
impl Exchange for BitgetClient {
    async fn get_ticker(&self, symbol: &str) -> ExchangeResult<Decimal> {
        let url = format!(
            "{}{TICKER_PATH}?symbol={}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        debug!(url = %url, "Fetching Bitget ticker");

        let resp = self.http.get(&url).send().await?;
        let body = Self::read_body(resp).await?;
        let price = Self::parse_close(&body)?;

        debug!(symbol, price = %price, "Ticker fetched");
        Ok(price)
    }

    async fn place_order(&self, order: &OrderRequest) -> ExchangeResult<serde_json::Value> {
        let body = Self::encode_order(order)?;
        let headers = self.signer.sign(Method::POST.as_str(), ORDERS_PATH, &body)?;

        let resp = self
            .http
            .post(format!("{}{ORDERS_PATH}", self.base_url))
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let body = Self::read_body(resp).await?;
        let payload: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ExchangeError::MalformedResponse(format!("order body: {e}")))?;

        // Some rejections arrive as 200 with an error code.
        if let Some(code) = payload.get("code").and_then(|c| c.as_str()) {
            if code != SUCCESS_CODE {
                return Err(ExchangeError::Rejected { status, body });
            }
        }

        info!(
            symbol = %order.symbol,
            side = %order.side,
            price = %order.price,
            size = %order.size,
            order_id = ?payload.pointer("/data/orderId"),
            "Bitget order placed"
        );

        Ok(payload)
    }

    fn name(&self) -> &str {
        EXCHANGE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
