//! Application context and loaded-model handles.

use crate::cache::ModelCache;
use crate::config::Pix2PixConfig;
use crate::image::{pixels_from_tensor, tensor_from_pixels, PixelFormat};
use crate::pipeline::Pipeline;
use crate::{Error, Result};
use pix2pix_core::{CpuEngine, Tensor, TensorEngine};
use pix2pix_network::{Fetcher, ModelSource};
use pix2pix_weights::{WeightDecoder, WeightMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

/// Loads generator weights and hands out [`ModelHandle`]s.
///
/// Owns the fetcher, the decoder and the model cache. Loading the same source
/// twice returns handles sharing one decoded weight map.
pub struct Pix2Pix<E = CpuEngine> {
    fetcher: Fetcher,
    decoder: WeightDecoder,
    cache: Arc<ModelCache>,
    pipeline: Arc<Pipeline<E>>,
    transfer_limit: Option<Arc<Semaphore>>,
}

impl Pix2Pix<CpuEngine> {
    /// Create a context running on the CPU engine
    pub fn new(config: Pix2PixConfig) -> Result<Self> {
        Self::with_engine(config, CpuEngine::new())
    }
}

impl<E: TensorEngine + 'static> Pix2Pix<E> {
    /// Create a context running on `engine`
    pub fn with_engine(config: Pix2PixConfig, engine: E) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher: Fetcher::new(config.network)?,
            decoder: WeightDecoder::new(config.decoder),
            cache: Arc::new(ModelCache::new()),
            pipeline: Arc::new(Pipeline::new(engine)),
            transfer_limit: config
                .max_concurrent_transfers
                .map(|n| Arc::new(Semaphore::new(n))),
        })
    }

    /// Share a cache with other contexts
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = cache;
        self
    }

    /// The model cache
    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// The inference pipeline
    pub fn pipeline(&self) -> &Pipeline<E> {
        &self.pipeline
    }

    /// Load the model at `identifier`: an `http(s)://` URL, a `file://` URL
    /// or a local path.
    pub async fn load_model(&self, identifier: &str) -> Result<ModelHandle<E>> {
        let source = ModelSource::parse(identifier)?;
        self.load_source(&source).await
    }

    /// Load the model at `source`, reusing a cached copy if present
    pub async fn load_source(&self, source: &ModelSource) -> Result<ModelHandle<E>> {
        let key = source.cache_key();
        let weights = self
            .cache
            .get_or_load(&key, || self.fetch_and_decode(source))
            .await?;
        Ok(self.handle(key, weights))
    }

    /// Wrap weights that are already decoded. The cache is not involved.
    pub fn from_weights(&self, name: impl Into<String>, weights: WeightMap) -> ModelHandle<E> {
        self.handle(name.into(), Arc::new(weights))
    }

    fn handle(&self, source: String, weights: Arc<WeightMap>) -> ModelHandle<E> {
        ModelHandle {
            source,
            weights,
            pipeline: self.pipeline.clone(),
            limit: self.transfer_limit.clone(),
        }
    }

    async fn fetch_and_decode(&self, source: &ModelSource) -> Result<WeightMap> {
        let bytes = self.fetcher.fetch(source).await?;
        let decoder = self.decoder.clone();
        let (weights, stats) =
            tokio::task::spawn_blocking(move || decoder.decode_with_stats(&bytes)).await??;
        info!(
            "Loaded {}: {} tensors, {} parameters, decoded in {}us",
            source, stats.tensors, stats.parameters, stats.decode_time_us
        );
        Ok(weights)
    }
}

/// A loaded generator.
///
/// Cheap to clone; clones share the weights and the transfer limit.
pub struct ModelHandle<E = CpuEngine> {
    source: String,
    weights: Arc<WeightMap>,
    pipeline: Arc<Pipeline<E>>,
    limit: Option<Arc<Semaphore>>,
}

impl<E> Clone for ModelHandle<E> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            weights: self.weights.clone(),
            pipeline: self.pipeline.clone(),
            limit: self.limit.clone(),
        }
    }
}

impl<E> std::fmt::Debug for ModelHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("source", &self.source)
            .field("tensors", &self.weights.len())
            .finish()
    }
}

impl<E: TensorEngine + 'static> ModelHandle<E> {
    /// Cache key of the source the weights came from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Decoded weights
    pub fn weights(&self) -> &Arc<WeightMap> {
        &self.weights
    }

    /// Run the generator on the calling thread
    pub fn transfer_blocking(&self, input: &Tensor) -> Result<Tensor> {
        self.pipeline.run(&self.weights, input)
    }

    /// Translate a `[H, W, 3]` image with values in `[0, 255]` into a
    /// `[H, W, 3]` image with values in `[0, 1]`.
    ///
    /// The work runs on the blocking thread pool. With a transfer limit
    /// configured, this waits for a free slot first.
    pub async fn transfer(&self, input: Tensor) -> Result<Tensor> {
        let permit = match &self.limit {
            Some(limit) => Some(
                limit
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Task(e.to_string()))?,
            ),
            None => None,
        };

        let pipeline = self.pipeline.clone();
        let weights = self.weights.clone();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.run(&weights, &input)
        })
        .await?
    }

    /// Translate an interleaved RGB or RGBA buffer into an interleaved RGB
    /// buffer of the same size.
    pub async fn transfer_pixels(
        &self,
        width: usize,
        height: usize,
        pixels: &[u8],
    ) -> Result<Vec<u8>> {
        let format = PixelFormat::detect(width, height, pixels.len()).ok_or_else(|| {
            Error::invalid_input(format!(
                "{} bytes is neither RGB nor RGBA for a {}x{} image",
                pixels.len(),
                width,
                height
            ))
        })?;
        let input = tensor_from_pixels(width, height, format, pixels)?;
        let output = self.transfer(input).await?;
        pixels_from_tensor(&output)
    }
}
