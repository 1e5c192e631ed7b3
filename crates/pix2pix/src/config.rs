//! Application configuration.

use crate::{Error, Result};
use pix2pix_network::NetworkConfig;
use pix2pix_weights::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a [`crate::Pix2Pix`] context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pix2PixConfig {
    /// Container fetching
    #[serde(default)]
    pub network: NetworkConfig,

    /// Container decoding
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Upper bound on transfers running at once; `None` is unbounded
    #[serde(default)]
    pub max_concurrent_transfers: Option<usize>,

    /// Log level used by the command-line tool
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Pix2PixConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            decoder: DecoderConfig::default(),
            max_concurrent_transfers: None,
            log_level: default_log_level(),
        }
    }
}

impl Pix2PixConfig {
    /// Parse from a JSON document; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| match e {
            Error::Config(message) => Error::Config(format!("{}: {}", path.display(), message)),
            other => other,
        })
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_transfers == Some(0) {
            return Err(Error::Config(
                "max_concurrent_transfers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Set network configuration
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Set decoder configuration
    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    /// Bound concurrent transfers
    pub fn with_max_concurrent_transfers(mut self, limit: usize) -> Self {
        self.max_concurrent_transfers = Some(limit);
        self
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
