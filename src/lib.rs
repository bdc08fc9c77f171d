//! GRIDBOT: Bitget spot grid-trading handler
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod exchange;
pub mod engine;
pub mod server;
