//! Per-symbol grid state store.
//!
//! Held by the engine behind an `Arc` and injected at construction, so tests
//! and the HTTP layer share the same instance. Each symbol gets its own async
//! lock; a grid step holds it for the whole fetch/decide/order sequence, so
//! overlapping invocations on the same symbol run one after the other.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::types::SymbolState;

pub type SymbolSlot = Arc<Mutex<SymbolState>>;

#[derive(Default)]
pub struct StateStore {
    slots: Mutex<HashMap<String, SymbolSlot>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lockable slot for `symbol`, created empty on first access.
    pub async fn slot(&self, symbol: &str) -> SymbolSlot {
        let mut slots = self.slots.lock().await;
        slots.entry(symbol.to_string()).or_default().clone()
    }

    /// Copy of the current state, `None` if the symbol was never touched.
    pub async fn get(&self, symbol: &str) -> Option<SymbolState> {
        let slot = self.slots.lock().await.get(symbol).cloned()?;
        let state = slot.lock().await.clone();
        Some(state)
    }

    /// Overwrite the state for `symbol`.
    pub async fn set(&self, symbol: &str, state: SymbolState) {
        let slot = self.slot(symbol).await;
        *slot.lock().await = state;
    }

    /// Forget everything about `symbol`; the next step starts Uninitialized.
    /// Returns whether any state existed.
    pub async fn reset(&self, symbol: &str) -> bool {
        let slot = self.slots.lock().await.get(symbol).cloned();
        match slot {
            Some(slot) => {
                *slot.lock().await = SymbolState::default();
                info!(symbol, "Grid state reset");
                true
            }
            None => false,
        }
    }

    /// All known symbols and their states, sorted by symbol.
    pub async fn snapshot(&self) -> Vec<(String, SymbolState)> {
        let slots: Vec<(String, SymbolSlot)> = self
            .slots
            .lock()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut out = Vec::with_capacity(slots.len());
        for (symbol, slot) in slots {
            let state = slot.lock().await.clone();
            out.push((symbol, state));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
