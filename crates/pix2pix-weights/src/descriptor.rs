//! Tensor descriptors from the container metadata chunk

use crate::{Result, WeightError};
use pix2pix_core::element_count;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name and shape of one tensor in the payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorDescriptor {
    /// Unique tensor name, e.g. `generator/encoder_1/conv2d/kernel`
    pub name: String,
    /// Dimensions, row-major
    pub shape: Vec<usize>,
}

impl TensorDescriptor {
    /// Create a descriptor
    pub fn new(name: impl Into<String>, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            name: name.into(),
            shape: shape.into(),
        }
    }

    /// Number of scalars this tensor occupies in the payload
    pub fn element_count(&self) -> Result<usize> {
        element_count(&self.shape).ok_or_else(|| {
            WeightError::malformed(format!("shape of '{}' overflows: {:?}", self.name, self.shape))
        })
    }

    /// Parse and validate the metadata chunk.
    ///
    /// Every shape must be non-empty with positive dimensions and every name
    /// must be unique.
    pub fn parse_list(bytes: &[u8]) -> Result<Vec<Self>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| WeightError::malformed(format!("metadata is not UTF-8: {}", e)))?;
        let descriptors: Vec<Self> = serde_json::from_str(text)
            .map_err(|e| WeightError::malformed(format!("metadata is not a descriptor list: {}", e)))?;

        let mut seen = HashSet::with_capacity(descriptors.len());
        for d in &descriptors {
            if d.shape.is_empty() || d.shape.contains(&0) {
                return Err(WeightError::malformed(format!(
                    "tensor '{}' has invalid shape {:?}",
                    d.name, d.shape
                )));
            }
            if !seen.insert(d.name.as_str()) {
                return Err(WeightError::malformed(format!(
                    "duplicate tensor name '{}'",
                    d.name
                )));
            }
        }

        Ok(descriptors)
    }

    /// Sum of element counts across descriptors
    pub fn total_elements(descriptors: &[Self]) -> Result<usize> {
        descriptors.iter().try_fold(0usize, |acc, d| {
            acc.checked_add(d.element_count()?)
                .ok_or_else(|| WeightError::malformed("total element count overflows"))
        })
    }
}
