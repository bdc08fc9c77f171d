//! Scripted exchange for integration testing.
//!
//! Provides a deterministic `Exchange` implementation whose prices and
//! failures are set from test code, and which records every order it
//! receives, all in-memory with no network.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gridbot::config::GridConfig;
use gridbot::engine::{GridEngine, StateStore};
use gridbot::exchange::{Exchange, ExchangeError, ExchangeResult};
use gridbot::server::{build_router, ServerState};
use gridbot::types::{OrderRequest, Side};

#[derive(Default)]
pub struct ScriptedExchange {
    prices: Mutex<HashMap<String, Decimal>>,
    orders: Mutex<Vec<OrderRequest>>,
    ticker_calls: Mutex<Vec<String>>,
    failing_tickers: Mutex<HashSet<String>>,
    failing_orders: Mutex<HashSet<(String, Side)>>,
    /// Artificial latency on every call, to make overlapping requests overlap.
    latency: Option<Duration>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn fail_ticker(&self, symbol: &str) {
        self.failing_tickers.lock().unwrap().insert(symbol.to_string());
    }

    pub fn fail_orders(&self, symbol: &str, side: Side) {
        self.failing_orders
            .lock()
            .unwrap()
            .insert((symbol.to_string(), side));
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn ticker_calls(&self) -> Vec<String> {
        self.ticker_calls.lock().unwrap().clone()
    }

    async fn delay(&self) {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl Exchange for ScriptedExchange {
    async fn get_ticker(&self, symbol: &str) -> ExchangeResult<Decimal> {
        self.delay().await;
        self.ticker_calls.lock().unwrap().push(symbol.to_string());
        if self.failing_tickers.lock().unwrap().contains(symbol) {
            return Err(ExchangeError::MalformedResponse(format!(
                "ticker missing data.close for {symbol}"
            )));
        }
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::MalformedResponse(format!("no price for {symbol}")))
    }

    async fn place_order(&self, order: &OrderRequest) -> ExchangeResult<serde_json::Value> {
        self.delay().await;
        let key = (order.symbol.clone(), order.side);
        if self.failing_orders.lock().unwrap().contains(&key) {
            return Err(ExchangeError::Rejected {
                status: reqwest::StatusCode::BAD_REQUEST,
                body: r#"{"code":"43012","msg":"Insufficient balance"}"#.to_string(),
            });
        }
        self.orders.lock().unwrap().push(order.clone());
        Ok(serde_json::json!({"code": "00000", "data": {"orderId": "1"}}))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Router over a fresh store, plus the exchange handle for assertions.
pub fn harness(
    exchange: ScriptedExchange,
    symbols: &[&str],
) -> (axum::Router, Arc<ScriptedExchange>, Arc<StateStore>) {
    let exchange = Arc::new(exchange);
    let store = Arc::new(StateStore::new());
    let config = GridConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        ..GridConfig::default()
    };
    let engine = GridEngine::new(exchange.clone(), store.clone(), config);
    let router = build_router(Arc::new(ServerState::new(engine)));
    (router, exchange, store)
}
