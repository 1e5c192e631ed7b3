//! 256-entry dequantization codebook

use crate::{Result, WeightError};
use serde::{Deserialize, Serialize};

/// Number of codebook entries (one per byte value)
pub const CODEBOOK_SIZE: usize = 256;

/// Size of the serialized codebook in bytes
pub const CODEBOOK_BYTES: usize = CODEBOOK_SIZE * 4;

/// Table mapping a quantized byte to its reconstructed weight.
///
/// Entries are serialized as little-endian IEEE-754 `f32`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Codebook {
    entries: Vec<f32>,
}

impl Codebook {
    /// Create from exactly 256 entries
    pub fn from_entries(entries: Vec<f32>) -> Result<Self> {
        if entries.len() != CODEBOOK_SIZE {
            return Err(WeightError::InvalidCodebook(format!(
                "expected {} entries, got {}",
                CODEBOOK_SIZE,
                entries.len()
            )));
        }
        Ok(Self { entries })
    }

    /// Parse the codebook chunk
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CODEBOOK_BYTES {
            return Err(WeightError::malformed(format!(
                "codebook chunk is {} bytes, expected {} ({} f32 entries)",
                bytes.len(),
                CODEBOOK_BYTES,
                CODEBOOK_SIZE
            )));
        }
        let entries = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { entries })
    }

    /// Serialize to the codebook chunk
    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Evenly spaced entries from `min` to `max` inclusive
    pub fn linear(min: f32, max: f32) -> Self {
        let step = (max - min) / (CODEBOOK_SIZE - 1) as f32;
        let entries = (0..CODEBOOK_SIZE)
            .map(|i| if i == CODEBOOK_SIZE - 1 { max } else { min + step * i as f32 })
            .collect();
        Self { entries }
    }

    /// Linear codebook spanning the range of `values`
    pub fn fit(values: &[f32]) -> Result<Self> {
        let mut finite = values.iter().copied().filter(|v| v.is_finite());
        let first = finite
            .next()
            .ok_or_else(|| WeightError::EncodingError("no finite values to fit".into()))?;
        let (min, max) = finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Ok(Self::linear(min, max))
    }

    /// All entries, indexed by byte value
    pub fn entries(&self) -> &[f32] {
        &self.entries
    }

    /// Reconstructed value for a byte
    #[inline]
    pub fn get(&self, index: u8) -> f32 {
        self.entries[index as usize]
    }

    /// Dequantize a payload by pure table lookup
    pub fn dequantize(&self, indices: &[u8]) -> Vec<f32> {
        indices.iter().map(|&b| self.get(b)).collect()
    }

    /// Index of the entry nearest to `value`
    pub fn quantize(&self, value: f32) -> u8 {
        self.quantizer().quantize(value)
    }

    /// Quantize many values, reusing one sorted lookup table
    pub fn quantize_all(&self, values: &[f32]) -> Vec<u8> {
        let quantizer = self.quantizer();
        values.iter().map(|&v| quantizer.quantize(v)).collect()
    }

    fn quantizer(&self) -> Quantizer {
        let mut sorted: Vec<(f32, u8)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .map(|(i, &v)| (v, i as u8))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        Quantizer { sorted }
    }

    /// Smallest gap between distinct entries, `None` if all entries are equal
    pub fn min_spacing(&self) -> Option<f32> {
        let mut values: Vec<f32> = self.entries.iter().copied().filter(|v| v.is_finite()).collect();
        values.sort_by(f32::total_cmp);
        values.dedup();
        values
            .windows(2)
            .map(|w| w[1] - w[0])
            .min_by(f32::total_cmp)
    }

    /// Smallest and largest finite entry
    pub fn range(&self) -> Option<(f32, f32)> {
        let mut finite = self.entries.iter().copied().filter(|v| v.is_finite());
        let first = finite.next()?;
        Some(finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }

    /// Reject entries that suggest the codebook was written with another byte
    /// order: non-finite values, magnitudes above `max_magnitude`, or non-zero
    /// magnitudes below `min_magnitude`.
    pub fn validate(&self, max_magnitude: f32, min_magnitude: f32) -> Result<()> {
        for (i, &v) in self.entries.iter().enumerate() {
            if !v.is_finite() {
                return Err(WeightError::InvalidCodebook(format!(
                    "entry {} is not finite ({})",
                    i, v
                )));
            }
            let magnitude = v.abs();
            if magnitude > max_magnitude {
                return Err(WeightError::InvalidCodebook(format!(
                    "entry {} has implausible magnitude {:e} (limit {:e}); wrong byte order?",
                    i, v, max_magnitude
                )));
            }
            if magnitude != 0.0 && magnitude < min_magnitude {
                return Err(WeightError::InvalidCodebook(format!(
                    "entry {} has implausible magnitude {:e} (floor {:e}); wrong byte order?",
                    i, v, min_magnitude
                )));
            }
        }
        Ok(())
    }
}

struct Quantizer {
    sorted: Vec<(f32, u8)>,
}

impl Quantizer {
    fn quantize(&self, value: f32) -> u8 {
        if self.sorted.is_empty() {
            return 0;
        }
        let pos = self.sorted.partition_point(|&(v, _)| v < value);
        let candidates = [pos.checked_sub(1), (pos < self.sorted.len()).then_some(pos)];
        candidates
            .into_iter()
            .flatten()
            .map(|i| self.sorted[i])
            .min_by(|a, b| (a.0 - value).abs().total_cmp(&(b.0 - value).abs()))
            .map(|(_, idx)| idx)
            .unwrap_or(0)
    }
}
