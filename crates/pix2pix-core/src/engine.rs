//! Tensor-math engine contract.
//!
//! ## Operations
//!
//! ```text
//! Elementwise      add / sub / mul / div (tensor or scalar rhs)
//! Activations      relu, leaky_relu, tanh
//! Convolution      conv2d, conv2d_transpose (explicit stride + padding)
//! Normalization    moments, batch_norm
//! Layout           concat_channels
//! ```
//!
//! Image activations are `[height, width, channels]`. Convolution kernels are
//! `[kh, kw, in, out]`; transposed convolution kernels are `[kh, kw, out, in]`.

use crate::error::Result;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// Spatial padding convention for strided convolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Padding {
    /// Output size is `ceil(input / stride)`, independent of kernel size.
    Same,
    /// No padding; output size is `(input - kernel) / stride + 1`.
    Valid,
}

impl Padding {
    /// Output length of a strided convolution along one axis.
    pub fn output_len(self, input: usize, kernel: usize, stride: usize) -> usize {
        match self {
            Padding::Same => input.div_ceil(stride),
            Padding::Valid => {
                if input < kernel {
                    0
                } else {
                    (input - kernel) / stride + 1
                }
            }
        }
    }

    /// Padding inserted before the first element along one axis.
    ///
    /// With `Same`, the total padding is split with the odd element placed
    /// after the data.
    pub fn pad_before(self, input: usize, kernel: usize, stride: usize) -> usize {
        match self {
            Padding::Same => {
                let out = self.output_len(input, kernel, stride);
                let needed = (out.saturating_sub(1)) * stride + kernel;
                needed.saturating_sub(input) / 2
            }
            Padding::Valid => 0,
        }
    }
}

/// Per-channel spatial statistics of an image tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    /// Mean per channel, shape `[channels]`.
    pub mean: Tensor,
    /// Population variance per channel, shape `[channels]`.
    pub variance: Tensor,
}

/// Numeric operations required by the inference pipeline.
///
/// Implementations must be pure: the same inputs always produce the same
/// output, and no operation mutates its operands.
pub trait TensorEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Elementwise `a + b`; `b` may match `a` or broadcast along trailing axes.
    fn add(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;

    /// Elementwise `a - b` with the same broadcasting as [`TensorEngine::add`].
    fn sub(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;

    /// Elementwise `a * b` with the same broadcasting as [`TensorEngine::add`].
    fn mul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;

    /// Elementwise `a / b` with the same broadcasting as [`TensorEngine::add`].
    fn div(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;

    /// `a + s` for every element.
    fn add_scalar(&self, a: &Tensor, s: f32) -> Tensor;

    /// `a - s` for every element.
    fn sub_scalar(&self, a: &Tensor, s: f32) -> Tensor {
        self.add_scalar(a, -s)
    }

    /// `a * s` for every element.
    fn mul_scalar(&self, a: &Tensor, s: f32) -> Tensor;

    /// `a / s` for every element.
    fn div_scalar(&self, a: &Tensor, s: f32) -> Tensor;

    /// Rectified linear unit.
    fn relu(&self, a: &Tensor) -> Tensor;

    /// Leaky rectified linear unit with negative slope `alpha`.
    fn leaky_relu(&self, a: &Tensor, alpha: f32) -> Tensor;

    /// Hyperbolic tangent.
    fn tanh(&self, a: &Tensor) -> Tensor;

    /// 2D convolution of a `[h, w, in]` input with a `[kh, kw, in, out]` kernel.
    fn conv2d(&self, input: &Tensor, filter: &Tensor, stride: usize, padding: Padding)
        -> Result<Tensor>;

    /// 2D transposed convolution of a `[h, w, in]` input with a
    /// `[kh, kw, out, in]` kernel, producing `output_shape`.
    fn conv2d_transpose(
        &self,
        input: &Tensor,
        filter: &Tensor,
        output_shape: [usize; 3],
        stride: usize,
        padding: Padding,
    ) -> Result<Tensor>;

    /// Per-channel mean and population variance over both spatial axes.
    fn moments(&self, input: &Tensor) -> Result<Moments>;

    /// `(x - mean) / sqrt(variance + epsilon) * scale + offset`, per channel.
    fn batch_norm(
        &self,
        input: &Tensor,
        moments: &Moments,
        offset: &Tensor,
        scale: &Tensor,
        epsilon: f32,
    ) -> Result<Tensor>;

    /// Concatenate two `[h, w, *]` tensors along the channel axis, `a` first.
    fn concat_channels(&self, a: &Tensor, b: &Tensor) -> Result<Tensor>;
}
