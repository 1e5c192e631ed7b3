//! Conversions between interleaved 8-bit pixels and image tensors.

use crate::architecture::IMAGE_CHANNELS;
use crate::{Error, Result};
use pix2pix_core::Tensor;

/// Interleaved pixel layouts accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb,
    /// Alpha is dropped on input
    Rgba,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    /// Infer the layout from a buffer length
    pub fn detect(width: usize, height: usize, len: usize) -> Option<Self> {
        let pixels = width.checked_mul(height)?;
        [PixelFormat::Rgb, PixelFormat::Rgba]
            .into_iter()
            .find(|f| pixels.checked_mul(f.channels()) == Some(len))
    }
}

/// Build a `[height, width, 3]` tensor with values in `[0, 255]` from an
/// interleaved RGB or RGBA buffer.
pub fn tensor_from_pixels(
    width: usize,
    height: usize,
    format: PixelFormat,
    pixels: &[u8],
) -> Result<Tensor> {
    let stride = format.channels();
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(stride))
        .ok_or_else(|| Error::invalid_input(format!("{}x{} image is too large", width, height)))?;
    if pixels.len() != expected {
        return Err(Error::invalid_input(format!(
            "{}x{} {:?} image needs {} bytes, got {}",
            width,
            height,
            format,
            expected,
            pixels.len()
        )));
    }

    let data = pixels
        .chunks_exact(stride)
        .flat_map(|px| px[..IMAGE_CHANNELS].iter().map(|&b| f32::from(b)))
        .collect();
    Ok(Tensor::from_vec(vec![height, width, IMAGE_CHANNELS], data)?)
}

/// Render one `[0, 1]` value as a byte: `floor(256 * v)` clamped to `0..=255`.
///
/// NaN renders as 0.
pub fn to_byte(value: f32) -> u8 {
    let scaled = (256.0 * value).floor();
    if scaled.is_nan() {
        0
    } else {
        scaled.clamp(0.0, 255.0) as u8
    }
}

/// Render a `[height, width, 3]` tensor with values in `[0, 1]` as
/// interleaved RGB bytes.
pub fn pixels_from_tensor(tensor: &Tensor) -> Result<Vec<u8>> {
    check_image(tensor)?;
    Ok(tensor.data().iter().map(|&v| to_byte(v)).collect())
}

/// Like [`pixels_from_tensor`] with an opaque alpha byte after every pixel.
pub fn rgba_from_tensor(tensor: &Tensor) -> Result<Vec<u8>> {
    check_image(tensor)?;
    let mut out = Vec::with_capacity(tensor.len() / IMAGE_CHANNELS * 4);
    for px in tensor.data().chunks_exact(IMAGE_CHANNELS) {
        out.extend(px.iter().map(|&v| to_byte(v)));
        out.push(u8::MAX);
    }
    Ok(out)
}

fn check_image(tensor: &Tensor) -> Result<()> {
    match tensor.dims3() {
        Ok((_, _, IMAGE_CHANNELS)) => Ok(()),
        _ => Err(Error::invalid_input(format!(
            "expected an [height, width, 3] image, got shape {:?}",
            tensor.shape()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_byte() {
        assert_eq!(to_byte(0.0), 0);
        assert_eq!(to_byte(0.5), 128);
        assert_eq!(to_byte(1.0), 255);
        assert_eq!(to_byte(0.999), 255);
        assert_eq!(to_byte(1.7), 255);
        assert_eq!(to_byte(-0.2), 0);
        assert_eq!(to_byte(f32::NAN), 0);
    }

    #[test]
    fn test_rgba_input_drops_alpha() {
        let rgba = [10, 20, 30, 255, 40, 50, 60, 0];
        let t = tensor_from_pixels(2, 1, PixelFormat::Rgba, &rgba).unwrap();
        assert_eq!(t.shape(), &[1, 2, 3]);
        assert_eq!(t.data(), &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
    }

    #[test]
    fn test_buffer_length_checked() {
        let err = tensor_from_pixels(2, 2, PixelFormat::Rgb, &[0; 11]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(PixelFormat::detect(2, 2, 12), Some(PixelFormat::Rgb));
        assert_eq!(PixelFormat::detect(2, 2, 16), Some(PixelFormat::Rgba));
        assert_eq!(PixelFormat::detect(2, 2, 13), None);
    }

    #[test]
    fn test_render() {
        let t = Tensor::from_vec(vec![1, 1, 3], vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(pixels_from_tensor(&t).unwrap(), vec![0, 128, 255]);
        assert_eq!(rgba_from_tensor(&t).unwrap(), vec![0, 128, 255, 255]);
        assert!(pixels_from_tensor(&Tensor::zeros(vec![3]).unwrap()).is_err());
    }
}
