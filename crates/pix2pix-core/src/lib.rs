//! # pix2pix-core
//!
//! Dense tensors and the numeric engine the pix2pix generator runs on.
//!
//! ```ignore
//! use pix2pix_core::{CpuEngine, Padding, Tensor, TensorEngine};
//!
//! let engine = CpuEngine::new();
//! let image = Tensor::zeros(vec![256, 256, 3])?;
//! let kernel = Tensor::zeros(vec![4, 4, 3, 64])?;
//! let features = engine.conv2d(&image, &kernel, 2, Padding::Same)?;
//! assert_eq!(features.shape(), &[128, 128, 64]);
//! ```

pub mod cpu;
pub mod engine;
pub mod error;
pub mod tensor;

pub use cpu::CpuEngine;
pub use engine::{Moments, Padding, TensorEngine};
pub use error::{Error, Result};
pub use tensor::{element_count, Tensor};
