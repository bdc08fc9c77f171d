//! Grid engine.
//!
//! One step per symbol: fetch the price, then
//! - Uninitialized: buy one lot, remember the price.
//! - Holding: if the price is at least `grid_spacing` above the last buy,
//!   sell one lot and immediately re-buy at the same price (a "flip");
//!   otherwise wait.
//! - Unreconciled: a previous flip sold but never re-bought. Place nothing
//!   until an operator resets the symbol.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::state::StateStore;
use crate::config::GridConfig;
use crate::exchange::Exchange;
use crate::types::{GridPhase, OrderRequest, Side, SymbolState};

/// What a single step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Bought { price: Decimal },
    Flipped { price: Decimal, profit: Decimal },
    Waiting { price: Decimal, diff: Decimal },
    Skipped { sold_at: Decimal },
}

#[derive(Debug, Clone)]
pub struct StepReport {
    pub symbol: String,
    pub outcome: StepOutcome,
    pub logs: Vec<String>,
}

pub struct GridEngine {
    exchange: Arc<dyn Exchange>,
    store: Arc<StateStore>,
    config: GridConfig,
}

impl GridEngine {
    pub fn new(exchange: Arc<dyn Exchange>, store: Arc<StateStore>, config: GridConfig) -> Self {
        Self {
            exchange,
            store,
            config,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Relative move of `price` over `last_buy`, `None` on overflow.
    pub fn price_diff(price: Decimal, last_buy: Decimal) -> Option<Decimal> {
        price.checked_sub(last_buy)?.checked_div(last_buy)
    }

    /// `(price - last_buy) * lot`, `None` on overflow.
    pub fn flip_profit(price: Decimal, last_buy: Decimal, lot: Decimal) -> Option<Decimal> {
        Some(price.checked_sub(last_buy)?.checked_mul(lot)?.normalize())
    }

    /// Run one grid step for `symbol`.
    ///
    /// Errors propagate unmodified apart from added context. When the ticker
    /// fetch fails no order is attempted.
    pub async fn step(&self, symbol: &str) -> Result<StepReport> {
        let slot = self.store.slot(symbol).await;
        let mut state = slot.lock().await;

        let price = self
            .exchange
            .get_ticker(symbol)
            .await
            .with_context(|| format!("Failed to fetch ticker for {symbol}"))?;

        debug!(symbol, price = %price, phase = %state.phase(), "Grid step");

        let (outcome, logs) = match state.phase() {
            GridPhase::Uninitialized => {
                self.order(symbol, Side::Buy, price).await?;
                state.record_buy(price);
                info!(symbol, price = %price, "Initial buy placed");
                (
                    StepOutcome::Bought { price },
                    vec![format!("Bought {symbol} @ {price}")],
                )
            }
            GridPhase::Holding { last_buy_price } => {
                let diff = Self::price_diff(price, last_buy_price).with_context(|| {
                    format!("Price move overflow for {symbol}: {last_buy_price} -> {price}")
                })?;
                if diff >= self.config.grid_spacing {
                    let (profit, logs) = self.flip(symbol, price, last_buy_price, &mut state).await?;
                    (StepOutcome::Flipped { price, profit }, logs)
                } else {
                    debug!(symbol, diff = %diff, "Below grid spacing");
                    (
                        StepOutcome::Waiting { price, diff },
                        vec![format!("No trade for {symbol}. Waiting...")],
                    )
                }
            }
            GridPhase::Unreconciled { sold_at, .. } => (
                StepOutcome::Skipped { sold_at },
                vec![format!(
                    "Skipping {symbol}: awaiting reconciliation after partial flip (sold @ {sold_at})"
                )],
            ),
        };

        Ok(StepReport {
            symbol: symbol.to_string(),
            outcome,
            logs,
        })
    }

    /// Sell one lot then re-buy one lot at `price`.
    ///
    /// A failed sell leaves the state untouched. A failed re-buy after a
    /// successful sell flags the symbol as unreconciled before returning the
    /// error.
    async fn flip(
        &self,
        symbol: &str,
        price: Decimal,
        last_buy_price: Decimal,
        state: &mut SymbolState,
    ) -> Result<(Decimal, Vec<String>)> {
        // Checked before the sell so an overflow never follows a filled order.
        let profit = Self::flip_profit(price, last_buy_price, self.config.lot_size)
            .with_context(|| format!("Profit overflow for {symbol} @ {price}"))?;

        self.order(symbol, Side::Sell, price).await?;

        let mut logs = vec![format!("Sold {symbol} @ {price} | Profit: ${profit}")];
        info!(symbol, price = %price, profit = %profit, "Grid sell placed");

        if let Err(e) = self.order(symbol, Side::Buy, price).await {
            state.mark_unreconciled(price);
            error!(
                symbol,
                sold_at = %price,
                error = %e,
                "Re-buy failed after sell; symbol needs manual reconciliation"
            );
            return Err(e.context(format!(
                "{symbol} sold @ {price} but re-buy failed; state flagged for reconciliation"
            )));
        }

        state.record_buy(price);
        logs.push(format!("Re-bought {symbol} @ {price}"));
        info!(symbol, price = %price, "Grid re-buy placed");

        Ok((profit, logs))
    }

    async fn order(&self, symbol: &str, side: Side, price: Decimal) -> Result<serde_json::Value> {
        let order = OrderRequest::new(symbol, side, price, self.config.lot_size);
        self.exchange
            .place_order(&order)
            .await
            .with_context(|| format!("Failed to place order: {order}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{ExchangeError, MockExchange};
    use mockall::Sequence;
    use reqwest::StatusCode;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn config() -> GridConfig {
        GridConfig {
            symbols: vec!["BTCUSDT".to_string()],
            grid_spacing: dec!(0.02),
            lot_size: dec!(0.001),
        }
    }

    fn ticker(mock: &mut MockExchange, price: Decimal) {
        mock.expect_get_ticker()
            .withf(|s: &str| s == "BTCUSDT")
            .times(1)
            .returning(move |_| Ok(price));
    }

    async fn engine_holding(mock: MockExchange, last: Option<Decimal>) -> GridEngine {
        let store = Arc::new(StateStore::new());
        if let Some(p) = last {
            let mut state = SymbolState::default();
            state.record_buy(p);
            store.set("BTCUSDT", state).await;
        }
        GridEngine::new(Arc::new(mock), store, config())
    }

    #[test]
    fn test_price_diff() {
        assert_eq!(GridEngine::price_diff(dec!(103), dec!(100)), Some(dec!(0.03)));
        assert_eq!(GridEngine::price_diff(dec!(99), dec!(100)), Some(dec!(-0.01)));
    }

    #[test]
    fn test_overflowing_arithmetic_is_none() {
        assert_eq!(GridEngine::price_diff(Decimal::MAX, dec!(0.0000000000000000000000000001)), None);
        assert_eq!(GridEngine::flip_profit(Decimal::MAX, dec!(1), Decimal::MAX), None);
        assert_eq!(GridEngine::flip_profit(dec!(103), dec!(100), dec!(0.001)), Some(dec!(0.003)));
    }

    #[tokio::test]
    async fn test_uninitialized_buys_once() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, dec!(100));
        mock.expect_place_order()
            .withf(|o| {
                o.symbol == "BTCUSDT"
                    && o.side == Side::Buy
                    && o.price == dec!(100)
                    && o.size == dec!(0.001)
            })
            .times(1)
            .returning(|_| Ok(json!({"code": "00000"})));

        let engine = engine_holding(mock, None).await;
        let report = engine.step("BTCUSDT").await.unwrap();

        assert_eq!(report.outcome, StepOutcome::Bought { price: dec!(100) });
        assert_eq!(report.logs, vec!["Bought BTCUSDT @ 100"]);
        let state = engine.store().get("BTCUSDT").await.unwrap();
        assert_eq!(state.last_buy_price, Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_below_spacing_waits() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, dec!(101));
        mock.expect_place_order().times(0);

        let engine = engine_holding(mock, Some(dec!(100))).await;
        let report = engine.step("BTCUSDT").await.unwrap();

        assert_eq!(
            report.outcome,
            StepOutcome::Waiting { price: dec!(101), diff: dec!(0.01) }
        );
        assert_eq!(report.logs, vec!["No trade for BTCUSDT. Waiting..."]);
        let state = engine.store().get("BTCUSDT").await.unwrap();
        assert_eq!(state.last_buy_price, Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_price_drop_waits() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, dec!(90));
        mock.expect_place_order().times(0);

        let engine = engine_holding(mock, Some(dec!(100))).await;
        let report = engine.step("BTCUSDT").await.unwrap();
        assert!(matches!(report.outcome, StepOutcome::Waiting { .. }));
    }

    #[tokio::test]
    async fn test_above_spacing_sells_then_rebuys() {
        let mut mock = MockExchange::new();
        let mut seq = Sequence::new();
        ticker(&mut mock, dec!(103));
        mock.expect_place_order()
            .withf(|o| o.side == Side::Sell && o.price == dec!(103) && o.size == dec!(0.001))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json!({"code": "00000"})));
        mock.expect_place_order()
            .withf(|o| o.side == Side::Buy && o.price == dec!(103) && o.size == dec!(0.001))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json!({"code": "00000"})));

        let engine = engine_holding(mock, Some(dec!(100))).await;
        let report = engine.step("BTCUSDT").await.unwrap();

        assert_eq!(
            report.outcome,
            StepOutcome::Flipped { price: dec!(103), profit: dec!(0.003) }
        );
        assert_eq!(
            report.logs,
            vec![
                "Sold BTCUSDT @ 103 | Profit: $0.003",
                "Re-bought BTCUSDT @ 103",
            ]
        );
        let state = engine.store().get("BTCUSDT").await.unwrap();
        assert_eq!(state.last_buy_price, Some(dec!(103)));
    }

    #[tokio::test]
    async fn test_exact_threshold_sells() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, dec!(102));
        mock.expect_place_order()
            .times(2)
            .returning(|_| Ok(json!({"code": "00000"})));

        let engine = engine_holding(mock, Some(dec!(100))).await;
        let report = engine.step("BTCUSDT").await.unwrap();

        assert!(matches!(report.outcome, StepOutcome::Flipped { .. }));
    }

    #[tokio::test]
    async fn test_extreme_price_move_errors_without_orders() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, Decimal::MAX);
        mock.expect_place_order().times(0);

        let engine = engine_holding(mock, Some(dec!(0.0000000000000000000000000001))).await;
        let err = engine.step("BTCUSDT").await.unwrap_err();

        assert!(format!("{err:#}").contains("Price move overflow for BTCUSDT"));
        let state = engine.store().get("BTCUSDT").await.unwrap();
        assert_eq!(
            state.last_buy_price,
            Some(dec!(0.0000000000000000000000000001))
        );
    }

    #[tokio::test]
    async fn test_ticker_failure_places_no_order() {
        let mut mock = MockExchange::new();
        mock.expect_get_ticker()
            .times(1)
            .returning(|_| Err(ExchangeError::MalformedResponse("no close".into())));
        mock.expect_place_order().times(0);

        let engine = engine_holding(mock, None).await;
        let err = engine.step("BTCUSDT").await.unwrap_err();

        assert!(format!("{err:#}").contains("Failed to fetch ticker for BTCUSDT"));
        assert_eq!(engine.store().get("BTCUSDT").await, Some(SymbolState::default()));
    }

    #[tokio::test]
    async fn test_failed_initial_buy_leaves_uninitialized() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, dec!(100));
        mock.expect_place_order().times(1).returning(|_| {
            Err(ExchangeError::Rejected {
                status: StatusCode::BAD_REQUEST,
                body: "Insufficient balance".into(),
            })
        });

        let engine = engine_holding(mock, None).await;
        assert!(engine.step("BTCUSDT").await.is_err());

        let state = engine.store().get("BTCUSDT").await.unwrap();
        assert_eq!(state.phase(), GridPhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_failed_sell_keeps_holding() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, dec!(105));
        mock.expect_place_order()
            .withf(|o| o.side == Side::Sell)
            .times(1)
            .returning(|_| {
                Err(ExchangeError::Rejected {
                    status: StatusCode::BAD_REQUEST,
                    body: "invalid price".into(),
                })
            });

        let engine = engine_holding(mock, Some(dec!(100))).await;
        assert!(engine.step("BTCUSDT").await.is_err());

        let state = engine.store().get("BTCUSDT").await.unwrap();
        assert_eq!(state.phase(), GridPhase::Holding { last_buy_price: dec!(100) });
    }

    #[tokio::test]
    async fn test_failed_rebuy_flags_unreconciled() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, dec!(103));
        mock.expect_place_order()
            .withf(|o| o.side == Side::Sell)
            .times(1)
            .returning(|_| Ok(json!({"code": "00000"})));
        mock.expect_place_order()
            .withf(|o| o.side == Side::Buy)
            .times(1)
            .returning(|_| {
                Err(ExchangeError::Rejected {
                    status: StatusCode::BAD_REQUEST,
                    body: "Insufficient balance".into(),
                })
            });

        let engine = engine_holding(mock, Some(dec!(100))).await;
        let err = engine.step("BTCUSDT").await.unwrap_err();

        assert!(format!("{err:#}").contains("flagged for reconciliation"));
        let state = engine.store().get("BTCUSDT").await.unwrap();
        assert_eq!(
            state.phase(),
            GridPhase::Unreconciled { last_buy_price: dec!(100), sold_at: dec!(103) }
        );
    }

    #[tokio::test]
    async fn test_unreconciled_skips_orders() {
        let mut mock = MockExchange::new();
        ticker(&mut mock, dec!(110));
        mock.expect_place_order().times(0);

        let store = Arc::new(StateStore::new());
        let mut state = SymbolState::default();
        state.record_buy(dec!(100));
        state.mark_unreconciled(dec!(103));
        store.set("BTCUSDT", state).await;
        let engine = GridEngine::new(Arc::new(mock), store, config());

        let report = engine.step("BTCUSDT").await.unwrap();
        assert_eq!(report.outcome, StepOutcome::Skipped { sold_at: dec!(103) });
        assert!(report.logs[0].contains("awaiting reconciliation"));
    }
}
