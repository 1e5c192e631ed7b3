//! Codebook-Quantized Weight Containers
//!
//! Reconstructs full-precision generator weights from a compact container
//! holding one byte per weight and a 256-entry codebook.
//!
//! # Pipeline
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      Weight Decoder                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │  bytes ──> ChunkReader ──> [metadata | codebook | payload]    │
//! │                                │          │          │        │
//! │                          descriptors  256 × f32   u8 indices  │
//! │                                │          └────┬─────┘        │
//! │                                │        codebook[b] lookup    │
//! │                                └───────────┐   │              │
//! │                                     slice + reshape           │
//! │                                             │                 │
//! │                                         WeightMap             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any framing or length error fails the whole decode; nothing is truncated
//! or padded.

mod codebook;
mod decoder;
mod descriptor;
mod encoder;
mod error;
mod format;
mod weights;

pub use codebook::{Codebook, CODEBOOK_BYTES, CODEBOOK_SIZE};
pub use decoder::{decode, DecodeStats, DecoderConfig, WeightDecoder};
pub use descriptor::TensorDescriptor;
pub use encoder::{EncodingStats, WeightEncoder};
pub use error::{Result, WeightError};
pub use format::{
    read_chunks, write_chunk, write_container, ChunkReader, Container, CHUNK_COUNT,
    LENGTH_PREFIX_SIZE,
};
pub use weights::WeightMap;

/// Conventional file extension for weight containers
pub const CONTAINER_EXTENSION: &str = "pict";

/// Prelude for common imports
pub mod prelude {
    pub use super::{decode, Codebook, Result, WeightDecoder, WeightEncoder, WeightMap};
}
