//! Synthetic generator weights for tests and demos.
//!
//! Builds complete weight maps for the pix2pix architecture at a chosen
//! channel width, so the full forward pass can run without a pretrained
//! container.
//!
//! # Feature Gate
//!
//! Available when the `testing` feature is enabled, or when running tests.
//!
//! ```toml
//! [dev-dependencies]
//! pix2pix = { version = "...", features = ["testing"] }
//! ```

use crate::architecture::{Architecture, StageKind, StageOutput, StageSpec, IMAGE_CHANNELS};
use pix2pix_core::Tensor;
use pix2pix_weights::{Codebook, WeightEncoder, WeightMap};

/// How kernel values are chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelFill {
    /// One tap at `(1, 1)` with weight 1 from input channel `c` to output
    /// channel `c`; every other weight is 0. With a 4×4 stride-2 "same"
    /// kernel this tap samples the even input positions.
    SingleTap,
    /// Deterministic pseudo-random values in `[-scale, scale]`.
    Pattern { seed: u32, scale: f32 },
}

/// Builder for a full generator weight map.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    /// Output channels of every hidden stage
    pub filters: usize,
    /// Square kernel size
    pub kernel_size: usize,
    pub fill: KernelFill,
}

impl SyntheticGenerator {
    /// 4×4 kernels with a small pseudo-random pattern
    pub fn new(filters: usize) -> Self {
        Self {
            filters,
            kernel_size: 4,
            fill: KernelFill::Pattern {
                seed: 0,
                scale: 0.1,
            },
        }
    }

    /// Set kernel values
    pub fn with_fill(mut self, fill: KernelFill) -> Self {
        self.fill = fill;
        self
    }

    /// Set kernel size
    pub fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    /// Named tensors in stage order.
    ///
    /// Biases and betas are 0 and gammas are 1 for [`KernelFill::SingleTap`].
    pub fn tensors(&self) -> Vec<(String, Tensor)> {
        let arch = Architecture::pix2pix();
        let mut out = Vec::new();
        let mut salt = 0u32;
        for stage in arch.stages() {
            let (cin, cout) = self.channels(stage);
            let k = self.kernel_size;
            let kernel_shape = match stage.kind {
                StageKind::Encoder => [k, k, cin, cout],
                StageKind::Decoder => [k, k, cout, cin],
            };
            out.push((stage.kernel_key.clone(), self.kernel(kernel_shape, salt)));
            out.push((stage.bias_key.clone(), self.vector(cout, 0.0, salt + 1)));
            if let StageOutput::BatchNorm {
                gamma_key,
                beta_key,
            } = &stage.output
            {
                out.push((gamma_key.clone(), self.vector(cout, 1.0, salt + 2)));
                out.push((beta_key.clone(), self.vector(cout, 0.0, salt + 3)));
            }
            salt += 4;
        }
        out
    }

    /// Decoded-equivalent weight map
    pub fn weights(&self) -> WeightMap {
        self.tensors().into_iter().collect()
    }

    /// Container bytes for the weights
    pub fn container(&self) -> pix2pix_weights::Result<Vec<u8>> {
        let mut encoder = WeightEncoder::new().with_codebook(Codebook::linear(-1.5, 1.5));
        for (name, tensor) in self.tensors() {
            encoder.add(name, tensor)?;
        }
        encoder.encode()
    }

    /// `(input, output)` channels of a stage's convolution
    fn channels(&self, stage: &StageSpec) -> (usize, usize) {
        let f = self.filters;
        match (stage.kind, stage.index) {
            (StageKind::Encoder, 1) => (IMAGE_CHANNELS, f),
            (StageKind::Encoder, _) => (f, f),
            (StageKind::Decoder, 1) => (2 * f, IMAGE_CHANNELS),
            (StageKind::Decoder, _) if stage.skip.is_none() => (f, f),
            (StageKind::Decoder, _) => (2 * f, f),
        }
    }

    fn kernel(&self, shape: [usize; 4], salt: u32) -> Tensor {
        let len: usize = shape.iter().product();
        let data = match self.fill {
            KernelFill::SingleTap => {
                let mut data = vec![0.0f32; len];
                let [kh, kw, a, b] = shape;
                if kh > 1 && kw > 1 {
                    let tap = kw + 1;
                    for c in 0..a.min(b) {
                        data[(tap * a + c) * b + c] = 1.0;
                    }
                }
                data
            }
            KernelFill::Pattern { seed, scale } => (0..len)
                .map(|i| scale * pattern(seed.wrapping_add(salt), i as u32))
                .collect(),
        };
        Tensor::from_vec(shape.to_vec(), data).expect("kernel length matches shape")
    }

    fn vector(&self, len: usize, base: f32, salt: u32) -> Tensor {
        let data = match self.fill {
            KernelFill::SingleTap => vec![base; len],
            KernelFill::Pattern { seed, scale } => (0..len)
                .map(|i| base + scale * pattern(seed.wrapping_add(salt), i as u32))
                .collect(),
        };
        Tensor::from_slice_1d(&data)
    }
}

/// Integer hash mapped to `[-1, 1]`.
fn pattern(seed: u32, i: u32) -> f32 {
    let mut x = i.wrapping_mul(0x9E37_79B9) ^ seed.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 16;
    x = x.wrapping_mul(0x7FEB_352D);
    x ^= x >> 15;
    (x as f32 / u32::MAX as f32) * 2.0 - 1.0
}

/// `[height, width, 3]` image of zeros.
pub fn zero_image(height: usize, width: usize) -> Tensor {
    Tensor::zeros(vec![height, width, IMAGE_CHANNELS]).expect("image shape fits in memory")
}

/// `[height, width, 3]` image with a diagonal gradient in `[0, 255]`.
pub fn gradient_image(height: usize, width: usize) -> Tensor {
    let mut data = Vec::with_capacity(height * width * IMAGE_CHANNELS);
    for y in 0..height {
        for x in 0..width {
            let v = ((x + y) * 255 / (height + width).max(1)) as f32;
            data.extend_from_slice(&[v, 255.0 - v, (x * 255 / width.max(1)) as f32]);
        }
    }
    Tensor::from_vec(vec![height, width, IMAGE_CHANNELS], data).expect("one value per channel")
}
