//! Weight container framing
//!
//! # Binary Layout
//!
//! ```text
//! ┌──────────────┬──────────────────────┐
//! │ length (u32) │ payload (length B)   │  × 3
//! │ big-endian   │                      │
//! └──────────────┴──────────────────────┘
//!
//! chunk 0  metadata   UTF-8 JSON [{"name": .., "shape": [..]}, ..]
//! chunk 1  codebook   256 × f32, little-endian
//! chunk 2  payload    one u8 codebook index per scalar, tensors in
//!                     descriptor order, row-major within a tensor
//! ```

use crate::{Codebook, Result, TensorDescriptor, WeightError};

/// Size of a chunk length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Number of chunks in a weight container
pub const CHUNK_COUNT: usize = 3;

/// Iterator over the length-prefixed chunks of a byte buffer.
///
/// Yields an error, then stops, if a length prefix is cut short or a chunk
/// runs past the end of the input.
#[derive(Debug, Clone)]
pub struct ChunkReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> ChunkReader<'a> {
    /// Start reading chunks at the beginning of `bytes`
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            failed: false,
        }
    }

    /// Current byte offset
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }

        let remaining = &self.bytes[self.offset..];
        let Some(prefix) = remaining.get(..LENGTH_PREFIX_SIZE) else {
            self.failed = true;
            return Some(Err(WeightError::malformed_at(
                format!("truncated chunk length ({} of 4 bytes)", remaining.len()),
                self.offset,
            )));
        };
        let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;

        let start = self.offset + LENGTH_PREFIX_SIZE;
        let available = self.bytes.len() - start;
        if len > available {
            self.failed = true;
            return Some(Err(WeightError::malformed_at(
                format!("chunk of {} bytes exceeds remaining {} bytes", len, available),
                self.offset,
            )));
        }

        self.offset = start + len;
        Some(Ok(&self.bytes[start..start + len]))
    }
}

/// Split a buffer into its length-prefixed chunks
pub fn read_chunks(bytes: &[u8]) -> Result<Vec<&[u8]>> {
    ChunkReader::new(bytes).collect()
}

/// Append one length-prefixed chunk
pub fn write_chunk(out: &mut Vec<u8>, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        WeightError::EncodingError(format!("chunk of {} bytes exceeds u32", payload.len()))
    })?;
    out.reserve(LENGTH_PREFIX_SIZE + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// Parsed but not yet dequantized weight container
#[derive(Debug, Clone)]
pub struct Container<'a> {
    /// Tensor descriptors in payload order
    pub descriptors: Vec<TensorDescriptor>,
    /// Dequantization codebook
    pub codebook: Codebook,
    /// Quantized payload, one index per scalar
    pub indices: &'a [u8],
}

impl<'a> Container<'a> {
    /// Parse the framing, metadata and codebook of a container.
    ///
    /// Validates that the descriptor element counts add up to the payload
    /// length; the payload itself is borrowed, not copied.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let chunks = read_chunks(bytes)?;
        if chunks.len() != CHUNK_COUNT {
            return Err(WeightError::malformed(format!(
                "expected {} chunks, found {}",
                CHUNK_COUNT,
                chunks.len()
            )));
        }

        let descriptors = TensorDescriptor::parse_list(chunks[0])?;
        let codebook = Codebook::from_bytes(chunks[1])?;
        let indices = chunks[2];

        let expected = TensorDescriptor::total_elements(&descriptors)?;
        if expected != indices.len() {
            return Err(WeightError::malformed(format!(
                "descriptors describe {} elements but payload holds {} bytes",
                expected,
                indices.len()
            )));
        }

        Ok(Self {
            descriptors,
            codebook,
            indices,
        })
    }

    /// Serialize descriptors, codebook and payload into container bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        write_container(&self.descriptors, &self.codebook, self.indices)
    }
}

/// Write the three container chunks
pub fn write_container(
    descriptors: &[TensorDescriptor],
    codebook: &Codebook,
    indices: &[u8],
) -> Result<Vec<u8>> {
    let metadata = serde_json::to_vec(descriptors)
        .map_err(|e| WeightError::EncodingError(e.to_string()))?;
    let codebook_bytes = codebook.to_bytes();

    let mut out = Vec::with_capacity(
        3 * LENGTH_PREFIX_SIZE + metadata.len() + codebook_bytes.len() + indices.len(),
    );
    write_chunk(&mut out, &metadata)?;
    write_chunk(&mut out, &codebook_bytes)?;
    write_chunk(&mut out, indices)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(chunks: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for c in chunks {
            write_chunk(&mut out, c).unwrap();
        }
        out
    }

    #[test]
    fn test_chunk_walk() {
        let bytes = framed(&[b"abc", b"", b"hello"]);
        let chunks = read_chunks(&bytes).unwrap();
        assert_eq!(chunks, vec![&b"abc"[..], &b""[..], &b"hello"[..]]);
    }

    #[test]
    fn test_length_prefix_is_big_endian() {
        let mut out = Vec::new();
        write_chunk(&mut out, &[7u8; 258]).unwrap();
        assert_eq!(&out[..4], &[0, 0, 1, 2]);
    }

    #[test]
    fn test_chunk_overruns_input() {
        let mut bytes = framed(&[b"abc", b"hello"]);
        bytes.pop();
        let err = read_chunks(&bytes).unwrap_err();
        assert!(matches!(err, WeightError::MalformedContainer(_)));
        assert!(err.to_string().contains("offset 7"));
    }

    #[test]
    fn test_truncated_length_prefix() {
        let mut bytes = framed(&[b"abc"]);
        bytes.extend_from_slice(&[0, 0]);
        assert!(read_chunks(&bytes).is_err());
    }

    #[test]
    fn test_reader_stops_after_error() {
        let bytes = [0u8, 0, 0, 9, 1];
        let mut reader = ChunkReader::new(&bytes);
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_container_wrong_chunk_count() {
        let codebook = Codebook::linear(-1.0, 1.0).to_bytes();
        let two = framed(&[b"[]", &codebook]);
        assert!(matches!(
            Container::parse(&two),
            Err(WeightError::MalformedContainer(_))
        ));

        let four = framed(&[b"[]", &codebook, b"", b""]);
        assert!(Container::parse(&four).is_err());
    }

    #[test]
    fn test_container_parse_and_write() {
        let descriptors = vec![
            TensorDescriptor::new("a", vec![2, 2]),
            TensorDescriptor::new("b", vec![3]),
        ];
        let codebook = Codebook::linear(0.0, 255.0);
        let indices: Vec<u8> = (0..7).collect();

        let bytes = write_container(&descriptors, &codebook, &indices).unwrap();
        let container = Container::parse(&bytes).unwrap();
        assert_eq!(container.descriptors, descriptors);
        assert_eq!(container.indices, &indices[..]);
        assert_eq!(container.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_container_payload_length_mismatch() {
        let descriptors = vec![TensorDescriptor::new("a", vec![2, 2])];
        let codebook = Codebook::linear(0.0, 1.0);

        let short = write_container(&descriptors, &codebook, &[0, 1, 2]).unwrap();
        let long = write_container(&descriptors, &codebook, &[0, 1, 2, 3, 4]).unwrap();
        for bytes in [short, long] {
            let err = Container::parse(&bytes).unwrap_err();
            assert!(err.to_string().contains("payload holds"));
        }
    }

    #[test]
    fn test_metadata_not_json() {
        let codebook = Codebook::linear(0.0, 1.0).to_bytes();
        let bytes = framed(&[b"{not json", &codebook, b""]);
        assert!(matches!(
            Container::parse(&bytes),
            Err(WeightError::MalformedContainer(_))
        ));

        let bytes = framed(&[&[0xff, 0xfe], &codebook, b""]);
        assert!(matches!(
            Container::parse(&bytes),
            Err(WeightError::MalformedContainer(_))
        ));
    }
}
