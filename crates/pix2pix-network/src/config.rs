//! Fetcher configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for fetching weight containers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Accept compressed transfer encodings
    pub compression: bool,
    /// User agent string
    pub user_agent: String,
    /// Largest container accepted, in bytes
    pub max_container_size: u64,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            compression: true,
            user_agent: format!("pix2pix-network/{}", env!("CARGO_PKG_VERSION")),
            max_container_size: 1024 * 1024 * 1024, // 1GB
            headers: Vec::new(),
        }
    }
}

impl NetworkConfig {
    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum container size
    pub fn with_max_container_size(mut self, bytes: u64) -> Self {
        self.max_container_size = bytes;
        self
    }

    /// Add header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}
