//! Weight container encoder

use crate::{write_container, Codebook, Result, TensorDescriptor, WeightError};
use pix2pix_core::Tensor;
use serde::{Deserialize, Serialize};

/// Statistics from encoding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncodingStats {
    /// Number of tensors
    pub tensors: usize,
    /// Number of scalars quantized
    pub parameters: usize,
    /// Mean squared quantization error
    pub mse: f32,
    /// Largest absolute quantization error
    pub max_error: f32,
    /// Container size in bytes
    pub container_bytes: usize,
}

impl EncodingStats {
    /// Ratio of f32 storage to container size
    pub fn compression_ratio(&self) -> f32 {
        if self.container_bytes == 0 {
            0.0
        } else {
            (self.parameters * 4) as f32 / self.container_bytes as f32
        }
    }
}

/// Builds weight containers from named tensors.
///
/// Tensors are written in insertion order.
#[derive(Debug, Default)]
pub struct WeightEncoder {
    tensors: Vec<(String, Tensor)>,
    codebook: Option<Codebook>,
}

impl WeightEncoder {
    /// Create an encoder that fits a linear codebook to the tensors
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantize against a fixed codebook instead of fitting one
    pub fn with_codebook(mut self, codebook: Codebook) -> Self {
        self.codebook = Some(codebook);
        self
    }

    /// Append a tensor
    pub fn add(&mut self, name: impl Into<String>, tensor: Tensor) -> Result<&mut Self> {
        let name = name.into();
        if self.tensors.iter().any(|(n, _)| *n == name) {
            return Err(WeightError::EncodingError(format!(
                "duplicate tensor name '{}'",
                name
            )));
        }
        if tensor.is_empty() || tensor.rank() == 0 {
            return Err(WeightError::EncodingError(format!(
                "tensor '{}' has no elements",
                name
            )));
        }
        self.tensors.push((name, tensor));
        Ok(self)
    }

    /// Number of tensors added
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether no tensors were added
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Codebook the container will use
    pub fn codebook(&self) -> Result<Codebook> {
        match &self.codebook {
            Some(cb) => Ok(cb.clone()),
            None => {
                let all: Vec<f32> = self
                    .tensors
                    .iter()
                    .flat_map(|(_, t)| t.data().iter().copied())
                    .collect();
                Codebook::fit(&all)
            }
        }
    }

    /// Serialize to container bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.encode_with_stats().map(|(bytes, _)| bytes)
    }

    /// Serialize to container bytes and report quantization error
    pub fn encode_with_stats(&self) -> Result<(Vec<u8>, EncodingStats)> {
        let codebook = self.codebook()?;

        let mut descriptors = Vec::with_capacity(self.tensors.len());
        let mut indices = Vec::new();
        for (name, tensor) in &self.tensors {
            descriptors.push(TensorDescriptor::new(name.clone(), tensor.shape().to_vec()));
            indices.extend(codebook.quantize_all(tensor.data()));
        }

        let mut sq_error = 0.0f64;
        let mut max_error = 0.0f32;
        let originals = self.tensors.iter().flat_map(|(_, t)| t.data().iter());
        for (&v, &b) in originals.zip(&indices) {
            let err = (v - codebook.get(b)).abs();
            sq_error += (err as f64) * (err as f64);
            max_error = max_error.max(err);
        }

        let bytes = write_container(&descriptors, &codebook, &indices)?;
        let stats = EncodingStats {
            tensors: descriptors.len(),
            parameters: indices.len(),
            mse: if indices.is_empty() {
                0.0
            } else {
                (sq_error / indices.len() as f64) as f32
            },
            max_error,
            container_bytes: bytes.len(),
        };
        Ok((bytes, stats))
    }
}
