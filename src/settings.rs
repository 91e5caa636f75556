//! Configuration for the receipt tool.

use std::{path::Path, time::Duration};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_KEY_ENV, Error};

/// Where payments go unless configured otherwise.
pub const DEFAULT_TREASURY: &str = "0x742d35Cc6634C0532925a3b844Bc9e7595f5bD21";

/// 0.0001 ether.
pub const DEFAULT_FEE_WEI: u64 = 100_000_000_000_000;

pub const DEFAULT_CONFIG_FILE: &str = "receipt.toml";

/// Application settings.
///
/// Sources, lowest precedence first: built-in defaults, an optional TOML
/// file, `RECEIPT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// JSON-RPC endpoint used for payments
    pub rpc_url: String,
    /// Payment destination
    pub treasury: String,
    /// Payment amount in wei
    pub fee_wei: u64,
    /// Default receipt output path
    pub output: String,
    /// Environment variable holding the private key
    pub key_env: String,
    /// Collector for opt-in telemetry
    pub telemetry_url: Option<String>,
    /// Network timeout for collaborators
    pub timeout_secs: u64,
}

impl Settings {
    /// Loads settings, reading `path` if given, otherwise `receipt.toml` in
    /// the working directory when it exists.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        Config::builder()
            .set_default("rpc_url", "https://mainnet.infura.io/v3/YOUR_KEY")
            .and_then(|b| b.set_default("treasury", DEFAULT_TREASURY))
            .and_then(|b| b.set_default("fee_wei", DEFAULT_FEE_WEI))
            .and_then(|b| b.set_default("output", "receipt.json"))
            .and_then(|b| b.set_default("key_env", DEFAULT_KEY_ENV))
            .and_then(|b| b.set_default("timeout_secs", 30u64))
            .map_err(|e| Error::Config(e.to_string()))?
            .add_source(file)
            .add_source(
                Environment::with_prefix("RECEIPT")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
