//! Weight Container Fetching
//!
//! Resolves a model source identifier and returns the raw container bytes.
//!
//! ```text
//! "https://host/model.pict" ──> ModelSource::Http ──> reqwest GET ──┐
//! "models/model.pict"       ──> ModelSource::File ──> tokio::fs  ───┴──> Bytes
//! ```
//!
//! Non-success statuses and unreadable files are returned as
//! [`NetworkError`]; callers decide whether to retry the whole load.

mod client;
mod config;
mod error;
mod source;

pub use client::Fetcher;
pub use config::NetworkConfig;
pub use error::{NetworkError, Result};
pub use source::ModelSource;

/// Prelude for common imports
pub mod prelude {
    pub use super::{Fetcher, ModelSource, NetworkConfig, NetworkError, Result};
}
