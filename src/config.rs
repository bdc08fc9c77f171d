//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` (optional) and deserializes into strongly-typed
//! structs, falling back to built-in defaults for anything omitted.
//! Secrets are referenced by env-var name in the config and resolved at
//! startup via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::exchange::bitget::DEFAULT_BASE_URL;

/// Default config file, overridable with `GRIDBOT_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub exchange: ExchangeConfig,
    pub server: ServerConfig,
}

/// Grid strategy constants. Immutable for the process lifetime.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub symbols: Vec<String>,
    /// Fractional move above the last buy that triggers a sell (0.02 = 2%).
    pub grid_spacing: Decimal,
    /// Quantity of the base asset per order.
    pub lot_size: Decimal,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            grid_spacing: dec!(0.02),
            lot_size: dec!(0.001),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub passphrase_env: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "BITGET_API_KEY".to_string(),
            api_secret_env: "BITGET_API_SECRET".to_string(),
            passphrase_env: "BITGET_PASSPHRASE".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise use the built-in defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            let cfg = Self::load(path)?;
            info!(path, "Configuration loaded");
            Ok(cfg)
        } else {
            info!(path, "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.grid.symbols.is_empty() {
            anyhow::bail!("grid.symbols must list at least one symbol");
        }
        if self.grid.grid_spacing <= Decimal::ZERO {
            anyhow::bail!("grid.grid_spacing must be positive, got {}", self.grid.grid_spacing);
        }
        if self.grid.lot_size <= Decimal::ZERO {
            anyhow::bail!("grid.lot_size must be positive, got {}", self.grid.lot_size);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Bitget API credentials.
///
/// Never validated locally: an empty value still produces a request, which
/// the exchange then rejects.
#[derive(Debug)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: SecretString,
    pub passphrase: String,
}

impl Credentials {
    pub fn new(api_key: &str, api_secret: &str, passphrase: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: SecretString::new(api_secret.to_string()),
            passphrase: passphrase.to_string(),
        }
    }

    /// Resolve credentials from the env vars named in `cfg`.
    pub fn from_env(cfg: &ExchangeConfig) -> Self {
        let read = |name: &str| {
            std::env::var(name).unwrap_or_else(|_| {
                warn!(var = name, "Credential env var not set; signed requests will be rejected");
                String::new()
            })
        };
        Self::new(
            &read(&cfg.api_key_env),
            &read(&cfg.api_secret_env),
            &read(&cfg.passphrase_env),
        )
    }
}
