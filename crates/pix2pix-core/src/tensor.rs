//! Dense row-major `f32` tensor.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of elements described by a shape.
///
/// Returns `None` on overflow. An empty shape describes a scalar.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// A dense tensor stored in row-major order (last dimension fastest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Create a tensor from a flat buffer.
    pub fn from_vec(shape: impl Into<Vec<usize>>, data: Vec<f32>) -> Result<Self> {
        let shape = shape.into();
        let expected = element_count(&shape)
            .ok_or_else(|| Error::invalid("from_vec", format!("shape {:?} overflows", shape)))?;
        if expected != data.len() {
            return Err(Error::ElementCount {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Create a 1D tensor.
    pub fn from_slice_1d(data: &[f32]) -> Self {
        Self {
            shape: vec![data.len()],
            data: data.to_vec(),
        }
    }

    /// Create a tensor filled with a constant.
    pub fn full(shape: impl Into<Vec<usize>>, value: f32) -> Result<Self> {
        let shape = shape.into();
        let len = element_count(&shape)
            .ok_or_else(|| Error::invalid("full", format!("shape {:?} overflows", shape)))?;
        Ok(Self {
            shape,
            data: vec![value; len],
        })
    }

    /// Create a zero tensor.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Result<Self> {
        Self::full(shape, 0.0)
    }

    /// Same shape, new buffer of equal length.
    pub(crate) fn with_data(&self, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            shape: self.shape.clone(),
            data,
        }
    }

    /// Tensor shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat row-major data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable flat row-major data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the tensor and return its buffer.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Reinterpret the buffer with a new shape of equal element count.
    pub fn reshape(self, shape: impl Into<Vec<usize>>) -> Result<Self> {
        Self::from_vec(shape, self.data)
    }

    /// Dimensions of a `[height, width, channels]` tensor.
    pub fn dims3(&self) -> Result<(usize, usize, usize)> {
        match self.shape.as_slice() {
            &[h, w, c] => Ok((h, w, c)),
            _ => Err(Error::rank("dims3", 3, &self.shape)),
        }
    }

    /// Dimensions of a 4D kernel.
    pub fn dims4(&self) -> Result<(usize, usize, usize, usize)> {
        match self.shape.as_slice() {
            &[a, b, c, d] => Ok((a, b, c, d)),
            _ => Err(Error::rank("dims4", 4, &self.shape)),
        }
    }

    /// Element of a `[height, width, channels]` tensor.
    pub fn at3(&self, y: usize, x: usize, c: usize) -> Option<f32> {
        let (h, w, ch) = self.dims3().ok()?;
        if y >= h || x >= w || c >= ch {
            return None;
        }
        self.data.get((y * w + x) * ch + c).copied()
    }

    /// Apply a function to every element in place.
    pub fn map_inplace(&mut self, f: impl Fn(f32) -> f32) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// Minimum and maximum element, `None` when empty.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let first = *self.data.first()?;
        Some(
            self.data
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Largest absolute difference to another tensor of the same shape.
    pub fn max_abs_diff(&self, other: &Tensor) -> Result<f32> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch("max_abs_diff", &self.shape, &other.shape));
        }
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .fold(0.0f32, |m, (a, b)| m.max((a - b).abs())))
    }
}
