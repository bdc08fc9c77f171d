//! Grid trading engine and its per-symbol state store.

pub mod grid;
pub mod state;

pub use grid::{GridEngine, StepOutcome, StepReport};
pub use state::StateStore;
