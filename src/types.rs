//! Shared types for the grid bot.
//!
//! These types form the data model used across the exchange, engine and
//! server modules, so none of those depend on each other's internals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire representation expected by the exchange.
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// A limit order about to be sent. Built per call, never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

impl OrderRequest {
    pub fn new(symbol: &str, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            price,
            size,
        }
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {}",
            self.side, self.size, self.symbol, self.price
        )
    }
}

// ---------------------------------------------------------------------------
// Per-symbol grid state
// ---------------------------------------------------------------------------

/// Remembered grid state for one symbol.
///
/// `last_buy_price` is either unset or the price of the most recent buy this
/// process issued. `unreconciled_sold_at` is set when a sell went through but
/// the follow-up rebuy did not, which leaves the exchange position out of step
/// with what the engine remembers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolState {
    pub last_buy_price: Option<Decimal>,
    pub unreconciled_sold_at: Option<Decimal>,
}

/// The phase a symbol is in, derived from its `SymbolState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridPhase {
    Uninitialized,
    Holding { last_buy_price: Decimal },
    Unreconciled { last_buy_price: Decimal, sold_at: Decimal },
}

impl SymbolState {
    pub fn phase(&self) -> GridPhase {
        match (self.last_buy_price, self.unreconciled_sold_at) {
            (None, _) => GridPhase::Uninitialized,
            (Some(last_buy_price), None) => GridPhase::Holding { last_buy_price },
            (Some(last_buy_price), Some(sold_at)) => GridPhase::Unreconciled {
                last_buy_price,
                sold_at,
            },
        }
    }

    /// Record a buy at `price`. Clears any reconciliation flag.
    pub fn record_buy(&mut self, price: Decimal) {
        self.last_buy_price = Some(price);
        self.unreconciled_sold_at = None;
    }

    /// Flag a half-finished flip: sold at `price`, rebuy missing.
    pub fn mark_unreconciled(&mut self, sold_at: Decimal) {
        self.unreconciled_sold_at = Some(sold_at);
    }
}

impl fmt::Display for GridPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridPhase::Uninitialized => write!(f, "UNINITIALIZED"),
            GridPhase::Holding { last_buy_price } => write!(f, "HOLDING @ {last_buy_price}"),
            GridPhase::Unreconciled { sold_at, .. } => {
                write!(f, "UNRECONCILED (sold @ {sold_at})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
