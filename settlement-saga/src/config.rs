//! Configuration for a saga node

use event_bus::Currency;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Saga node configuration
///
/// Each component stores under its own subdirectory of `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root data directory
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Currency for wallets provisioned from `user.created` events
    pub default_currency: Currency,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/payrail"),
            service_name: "payrail-node".to_string(),
            default_currency: Currency::USD,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("PAYRAIL_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(code) = std::env::var("PAYRAIL_DEFAULT_CURRENCY") {
            config.default_currency = Currency::parse(&code)
                .ok_or_else(|| crate::Error::Config(format!("Unknown currency: {}", code)))?;
        }

        Ok(config)
    }
}
