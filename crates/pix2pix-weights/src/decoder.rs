//! Weight container decoder

use crate::{Container, Result, WeightError, WeightMap};
use pix2pix_core::Tensor;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for the decoder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Check codebook entries for signs of a byte-order mismatch
    pub validate_codebook: bool,
    /// Largest plausible codebook magnitude
    pub max_codebook_magnitude: f32,
    /// Smallest plausible non-zero codebook magnitude
    pub min_codebook_magnitude: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            validate_codebook: true,
            max_codebook_magnitude: 1.0e4,
            min_codebook_magnitude: 1.0e-30,
        }
    }
}

impl DecoderConfig {
    /// Disable codebook plausibility checks
    pub fn without_codebook_validation(mut self) -> Self {
        self.validate_codebook = false;
        self
    }
}

/// Statistics from decoding one container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Container size in bytes
    pub container_bytes: usize,
    /// Number of tensors decoded
    pub tensors: usize,
    /// Number of scalars dequantized
    pub parameters: usize,
    /// Total decode time in microseconds
    pub decode_time_us: u64,
}

/// Decoder from container bytes to a [`WeightMap`]
#[derive(Debug, Clone, Default)]
pub struct WeightDecoder {
    config: DecoderConfig,
}

impl WeightDecoder {
    /// Create a decoder
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decode a container
    pub fn decode(&self, bytes: &[u8]) -> Result<WeightMap> {
        self.decode_with_stats(bytes).map(|(weights, _)| weights)
    }

    /// Decode a container and report statistics
    pub fn decode_with_stats(&self, bytes: &[u8]) -> Result<(WeightMap, DecodeStats)> {
        let start = std::time::Instant::now();

        let container = Container::parse(bytes)?;
        if self.config.validate_codebook {
            container.codebook.validate(
                self.config.max_codebook_magnitude,
                self.config.min_codebook_magnitude,
            )?;
        }

        let values = container.codebook.dequantize(container.indices);

        let mut offset = 0;
        let mut tensors = Vec::with_capacity(container.descriptors.len());
        for descriptor in container.descriptors {
            let size = descriptor.element_count()?;
            let slice = values.get(offset..offset + size).ok_or_else(|| {
                WeightError::malformed_at(
                    format!("payload ends inside tensor '{}'", descriptor.name),
                    offset,
                )
            })?;
            let tensor = Tensor::from_vec(descriptor.shape, slice.to_vec())?;
            tensors.push((descriptor.name, tensor));
            offset += size;
        }

        let weights: WeightMap = tensors.into_iter().collect();
        let stats = DecodeStats {
            container_bytes: bytes.len(),
            tensors: weights.len(),
            parameters: values.len(),
            decode_time_us: start.elapsed().as_micros() as u64,
        };
        debug!(
            "Decoded {} tensors ({} parameters) from {} bytes in {}us",
            stats.tensors, stats.parameters, stats.container_bytes, stats.decode_time_us
        );

        Ok((weights, stats))
    }

    /// Get decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }
}

/// Decode a container with the default configuration
pub fn decode(bytes: &[u8]) -> Result<WeightMap> {
    WeightDecoder::default().decode(bytes)
}
