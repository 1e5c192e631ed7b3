//! Model source identifiers

use crate::{NetworkError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Where a weight container is fetched from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelSource {
    /// `http://` or `https://` URL
    Http(Url),
    /// Local file
    File(PathBuf),
}

impl ModelSource {
    /// Parse a source identifier.
    ///
    /// `http://` and `https://` identifiers are URLs, `file://` URLs and
    /// everything else are local paths.
    pub fn parse(identifier: &str) -> Result<Self> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(NetworkError::InvalidSource("empty identifier".into()));
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Ok(ModelSource::Http(Url::parse(trimmed)?));
        }
        if lower.starts_with("file://") {
            let url = Url::parse(trimmed)?;
            let path = url.to_file_path().map_err(|_| {
                NetworkError::InvalidSource(format!("not a local file URL: {}", trimmed))
            })?;
            return Ok(ModelSource::File(path));
        }

        Ok(ModelSource::File(PathBuf::from(trimmed)))
    }

    /// Create a local file source
    pub fn file(path: impl AsRef<Path>) -> Self {
        ModelSource::File(path.as_ref().to_path_buf())
    }

    /// Key identifying this source in a cache
    pub fn cache_key(&self) -> String {
        match self {
            ModelSource::Http(url) => url.as_str().to_string(),
            ModelSource::File(path) => format!("file:{}", path.display()),
        }
    }

    /// Whether this source needs the network
    pub fn is_remote(&self) -> bool {
        matches!(self, ModelSource::Http(_))
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Http(url) => write!(f, "{}", url),
            ModelSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl std::str::FromStr for ModelSource {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
