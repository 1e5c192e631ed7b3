//! # pix2pix
//!
//! Image-to-image translation with a pretrained pix2pix generator whose
//! weights ship as a codebook-quantized container.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Pix2Pix                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  load_model(source)                                              │
//! │     │                                                            │
//! │     ├─> ModelCache ── hit ──────────────────────────┐            │
//! │     │      │ miss (one load per source)             │            │
//! │     │      v                                        │            │
//! │     │   Fetcher (http / file) ─> WeightDecoder ─> WeightMap      │
//! │     │                                               │            │
//! │     v                                               v            │
//! │  ModelHandle::transfer(image)  ── spawn_blocking ──> Pipeline    │
//! │                                                                  │
//! │  Pipeline: normalize ─> encoder 1..8 ─> decoder 8..1 ─> [0, 1]   │
//! │                          │ skip activations ──^                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pix2pix::{Pix2Pix, Pix2PixConfig};
//!
//! let pix2pix = Pix2Pix::new(Pix2PixConfig::default())?;
//! let model = pix2pix.load_model("https://example.com/facades.pict").await?;
//! let rgb_out = model.transfer_pixels(256, 256, &rgb_in).await?;
//! ```

pub mod architecture;
pub mod cache;
pub mod config;
mod error;
pub mod image;
pub mod model;
pub mod pipeline;

// Available when testing feature is enabled or during tests
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use architecture::{Architecture, StageKind, StageSpec};
pub use cache::{CacheStats, ModelCache};
pub use config::Pix2PixConfig;
pub use error::{Error, Result};
pub use image::{pixels_from_tensor, rgba_from_tensor, tensor_from_pixels, PixelFormat};
pub use model::{ModelHandle, Pix2Pix};
pub use pipeline::{Pipeline, StageTrace};

pub use pix2pix_core::{CpuEngine, Tensor, TensorEngine};
pub use pix2pix_network::{ModelSource, NetworkConfig};
pub use pix2pix_weights::{DecoderConfig, WeightMap};

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        Error, ModelHandle, Pix2Pix, Pix2PixConfig, Result, Tensor, TensorEngine, WeightMap,
    };
}
