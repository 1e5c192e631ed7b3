//! Container fetcher for HTTP and local sources

use crate::{ModelSource, NetworkConfig, NetworkError, Result};
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// Fetches raw container bytes. Failures are surfaced immediately; there is
/// no retry loop here.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: NetworkConfig,
}

impl Fetcher {
    /// Create a fetcher
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if config.compression {
            builder = builder.gzip(true).brotli(true);
        }

        let client = builder
            .build()
            .map_err(|e| NetworkError::Configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Fetch the container at `source`
    pub async fn fetch(&self, source: &ModelSource) -> Result<Bytes> {
        let start = std::time::Instant::now();
        let bytes = match source {
            ModelSource::Http(url) => self.fetch_http(url).await?,
            ModelSource::File(path) => self.fetch_file(path).await?,
        };
        info!(
            "Fetched {} bytes from {} in {:?}",
            bytes.len(),
            source,
            start.elapsed()
        );
        Ok(bytes)
    }

    async fn fetch_http(&self, url: &Url) -> Result<Bytes> {
        debug!("Fetching: {}", url);
        let timeout = self.config.timeout;

        let mut request = self.client.get(url.clone());
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(e, timeout))?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                if let Some(len) = response.content_length() {
                    self.check_size(len)?;
                }
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| NetworkError::from_reqwest(e, timeout))?;
                self.check_size(bytes.len() as u64)?;
                Ok(bytes)
            }
            StatusCode::NOT_FOUND => Err(NetworkError::NotFound(url.to_string())),
            _ => Err(NetworkError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn fetch_file(&self, path: &Path) -> Result<Bytes> {
        debug!("Reading: {}", path.display());
        let metadata = tokio::fs::metadata(path).await.map_err(|e| file_error(path, e))?;
        if !metadata.is_file() {
            return Err(NetworkError::InvalidSource(format!(
                "{} is not a file",
                path.display()
            )));
        }
        self.check_size(metadata.len())?;

        let data = tokio::fs::read(path).await.map_err(|e| file_error(path, e))?;
        Ok(Bytes::from(data))
    }

    fn check_size(&self, len: u64) -> Result<()> {
        if len > self.config.max_container_size {
            return Err(NetworkError::Configuration(format!(
                "container of {} bytes exceeds limit of {} bytes",
                len, self.config.max_container_size
            )));
        }
        Ok(())
    }

    /// Get fetcher configuration
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

fn file_error(path: &Path, e: std::io::Error) -> NetworkError {
    if e.kind() == std::io::ErrorKind::NotFound {
        NetworkError::NotFound(path.display().to_string())
    } else {
        NetworkError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fetch_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.pict");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let fetcher = Fetcher::new(NetworkConfig::default()).unwrap();
        let bytes = fetcher.fetch(&ModelSource::file(&path)).await.unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let dir = tempdir().unwrap();
        let fetcher = Fetcher::new(NetworkConfig::default()).unwrap();
        let err = fetcher
            .fetch(&ModelSource::file(dir.path().join("absent.pict")))
            .await
            .unwrap_err();
        assert!(matches!(err, NetworkError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_directory_rejected() {
        let dir = tempdir().unwrap();
        let fetcher = Fetcher::new(NetworkConfig::default()).unwrap();
        let err = fetcher.fetch(&ModelSource::file(dir.path())).await.unwrap_err();
        assert!(matches!(err, NetworkError::InvalidSource(_)));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.pict");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let fetcher = Fetcher::new(NetworkConfig::default().with_max_container_size(16)).unwrap();
        let err = fetcher.fetch(&ModelSource::file(&path)).await.unwrap_err();
        assert!(matches!(err, NetworkError::Configuration(_)));
    }
}
