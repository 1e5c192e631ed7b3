//! Decoded, name-indexed weight tensors

use indexmap::IndexMap;
use pix2pix_core::Tensor;

/// Immutable mapping from tensor name to dequantized tensor.
///
/// Iteration follows the descriptor order of the container it was decoded
/// from. There is no mutating API once built; share it as `Arc<WeightMap>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightMap {
    tensors: IndexMap<String, Tensor>,
}

impl WeightMap {
    /// Look up a tensor by name
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Whether a tensor exists
    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Number of tensors
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether the map holds no tensors
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Tensor names in container order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// `(name, tensor)` pairs in container order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total number of scalars across all tensors
    pub fn parameter_count(&self) -> usize {
        self.tensors.values().map(Tensor::len).sum()
    }

    /// Memory held by tensor data in bytes
    pub fn size_bytes(&self) -> usize {
        self.parameter_count() * std::mem::size_of::<f32>()
    }

    /// Copy with one tensor removed
    pub fn without(&self, name: &str) -> Self {
        let mut tensors = self.tensors.clone();
        tensors.shift_remove(name);
        Self { tensors }
    }
}

impl FromIterator<(String, Tensor)> for WeightMap {
    /// Later entries replace earlier ones with the same name.
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a WeightMap {
    type Item = (&'a String, &'a Tensor);
    type IntoIter = indexmap::map::Iter<'a, String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.tensors.iter()
    }
}
