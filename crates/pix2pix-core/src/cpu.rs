//! Multi-threaded CPU implementation of [`TensorEngine`].
//!
//! Convolutions parallelize over output rows with rayon; every output row is
//! written by exactly one task, so results do not depend on scheduling.

use crate::engine::{Moments, Padding, TensorEngine};
use crate::error::{Error, Result};
use crate::tensor::Tensor;
use rayon::prelude::*;

/// CPU tensor engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuEngine;

impl CpuEngine {
    /// Create a new CPU engine.
    pub fn new() -> Self {
        Self
    }

    fn unary(&self, a: &Tensor, f: impl Fn(f32) -> f32 + Sync) -> Tensor {
        a.with_data(a.data().par_iter().map(|&v| f(v)).collect())
    }

    fn binary(
        &self,
        op: &'static str,
        a: &Tensor,
        b: &Tensor,
        f: impl Fn(f32, f32) -> f32 + Sync,
    ) -> Result<Tensor> {
        if a.shape() == b.shape() {
            let data = a
                .data()
                .par_iter()
                .zip(b.data().par_iter())
                .map(|(&x, &y)| f(x, y))
                .collect();
            return Tensor::from_vec(a.shape().to_vec(), data);
        }

        // Trailing-axis broadcast, e.g. a `[c]` bias against `[h, w, c]`.
        let trailing = a.rank() >= b.rank() && a.shape().ends_with(b.shape());
        if !trailing || b.is_empty() {
            return Err(Error::shape_mismatch(op, a.shape(), b.shape()));
        }
        let inner = b.len();
        let rhs = b.data();
        let mut out = vec![0.0f32; a.len()];
        out.par_chunks_mut(inner)
            .zip(a.data().par_chunks(inner))
            .for_each(|(dst, src)| {
                for ((d, &x), &y) in dst.iter_mut().zip(src).zip(rhs) {
                    *d = f(x, y);
                }
            });
        Tensor::from_vec(a.shape().to_vec(), out)
    }
}

/// Validate a `[h, w, c]` activation.
fn image_dims(op: &'static str, t: &Tensor) -> Result<(usize, usize, usize)> {
    t.dims3().map_err(|_| Error::rank(op, 3, t.shape()))
}

fn check_stride(op: &'static str, stride: usize) -> Result<()> {
    if stride == 0 {
        return Err(Error::invalid(op, "stride must be positive"));
    }
    Ok(())
}

impl TensorEngine for CpuEngine {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn add(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary("add", a, b, |x, y| x + y)
    }

    fn sub(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary("sub", a, b, |x, y| x - y)
    }

    fn mul(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary("mul", a, b, |x, y| x * y)
    }

    fn div(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        self.binary("div", a, b, |x, y| x / y)
    }

    fn add_scalar(&self, a: &Tensor, s: f32) -> Tensor {
        self.unary(a, |v| v + s)
    }

    fn mul_scalar(&self, a: &Tensor, s: f32) -> Tensor {
        self.unary(a, |v| v * s)
    }

    fn div_scalar(&self, a: &Tensor, s: f32) -> Tensor {
        self.unary(a, |v| v / s)
    }

    fn relu(&self, a: &Tensor) -> Tensor {
        self.unary(a, |v| v.max(0.0))
    }

    fn leaky_relu(&self, a: &Tensor, alpha: f32) -> Tensor {
        self.unary(a, |v| if v < 0.0 { v * alpha } else { v })
    }

    fn tanh(&self, a: &Tensor) -> Tensor {
        self.unary(a, f32::tanh)
    }

    fn conv2d(
        &self,
        input: &Tensor,
        filter: &Tensor,
        stride: usize,
        padding: Padding,
    ) -> Result<Tensor> {
        check_stride("conv2d", stride)?;
        let (h, w, cin) = image_dims("conv2d", input)?;
        let (kh, kw, fin, cout) = filter
            .dims4()
            .map_err(|_| Error::rank("conv2d", 4, filter.shape()))?;
        if fin != cin {
            return Err(Error::shape_mismatch("conv2d", input.shape(), filter.shape()));
        }

        let oh = padding.output_len(h, kh, stride);
        let ow = padding.output_len(w, kw, stride);
        let pad_top = padding.pad_before(h, kh, stride) as isize;
        let pad_left = padding.pad_before(w, kw, stride) as isize;

        let src = input.data();
        let kernel = filter.data();
        let mut out = vec![0.0f32; oh * ow * cout];
        if cout == 0 {
            return Tensor::from_vec(vec![oh, ow, cout], out);
        }

        out.par_chunks_mut(ow * cout)
            .enumerate()
            .for_each(|(oy, row)| {
                for ox in 0..ow {
                    let acc = &mut row[ox * cout..(ox + 1) * cout];
                    for ky in 0..kh {
                        let iy = (oy * stride) as isize + ky as isize - pad_top;
                        if iy < 0 || iy >= h as isize {
                            continue;
                        }
                        for kx in 0..kw {
                            let ix = (ox * stride) as isize + kx as isize - pad_left;
                            if ix < 0 || ix >= w as isize {
                                continue;
                            }
                            let pixel = (iy as usize * w + ix as usize) * cin;
                            let taps = (ky * kw + kx) * cin * cout;
                            for ci in 0..cin {
                                let v = src[pixel + ci];
                                if v == 0.0 {
                                    continue;
                                }
                                let weights = &kernel[taps + ci * cout..taps + (ci + 1) * cout];
                                for (a, &k) in acc.iter_mut().zip(weights) {
                                    *a += v * k;
                                }
                            }
                        }
                    }
                }
            });

        Tensor::from_vec(vec![oh, ow, cout], out)
    }

    fn conv2d_transpose(
        &self,
        input: &Tensor,
        filter: &Tensor,
        output_shape: [usize; 3],
        stride: usize,
        padding: Padding,
    ) -> Result<Tensor> {
        check_stride("conv2d_transpose", stride)?;
        let (h, w, cin) = image_dims("conv2d_transpose", input)?;
        let (kh, kw, fout, fin) = filter
            .dims4()
            .map_err(|_| Error::rank("conv2d_transpose", 4, filter.shape()))?;
        let [oh, ow, cout] = output_shape;
        if fin != cin || fout != cout {
            return Err(Error::shape_mismatch(
                "conv2d_transpose",
                input.shape(),
                filter.shape(),
            ));
        }
        // The forward convolution of the output must land on the input size.
        if padding.output_len(oh, kh, stride) != h || padding.output_len(ow, kw, stride) != w {
            return Err(Error::shape_mismatch(
                "conv2d_transpose",
                input.shape(),
                &output_shape,
            ));
        }

        let pad_top = padding.pad_before(oh, kh, stride);
        let pad_left = padding.pad_before(ow, kw, stride);

        // Reorder to [kh, kw, in, out] so the inner loop is contiguous.
        let raw = filter.data();
        let mut kernel = vec![0.0f32; raw.len()];
        for tap in 0..kh * kw {
            for co in 0..cout {
                for ci in 0..cin {
                    kernel[(tap * cin + ci) * cout + co] = raw[(tap * cout + co) * cin + ci];
                }
            }
        }

        let src = input.data();
        let mut out = vec![0.0f32; oh * ow * cout];
        if cout == 0 {
            return Tensor::from_vec(output_shape.to_vec(), out);
        }

        out.par_chunks_mut(ow * cout)
            .enumerate()
            .for_each(|(oy, row)| {
                for ox in 0..ow {
                    let acc = &mut row[ox * cout..(ox + 1) * cout];
                    for ky in 0..kh {
                        // Input row iy contributes when iy * stride + ky - pad == oy.
                        let t = oy + pad_top;
                        if t < ky || (t - ky) % stride != 0 {
                            continue;
                        }
                        let iy = (t - ky) / stride;
                        if iy >= h {
                            continue;
                        }
                        for kx in 0..kw {
                            let u = ox + pad_left;
                            if u < kx || (u - kx) % stride != 0 {
                                continue;
                            }
                            let ix = (u - kx) / stride;
                            if ix >= w {
                                continue;
                            }
                            let pixel = (iy * w + ix) * cin;
                            let taps = (ky * kw + kx) * cin * cout;
                            for ci in 0..cin {
                                let v = src[pixel + ci];
                                if v == 0.0 {
                                    continue;
                                }
                                let weights = &kernel[taps + ci * cout..taps + (ci + 1) * cout];
                                for (a, &k) in acc.iter_mut().zip(weights) {
                                    *a += v * k;
                                }
                            }
                        }
                    }
                }
            });

        Tensor::from_vec(output_shape.to_vec(), out)
    }

    fn moments(&self, input: &Tensor) -> Result<Moments> {
        let (h, w, c) = image_dims("moments", input)?;
        let n = h * w;
        if n == 0 {
            return Err(Error::invalid("moments", "empty spatial extent"));
        }

        let data = input.data();
        let mut sum = vec![0.0f64; c];
        for pixel in data.chunks_exact(c.max(1)) {
            for (s, &v) in sum.iter_mut().zip(pixel) {
                *s += v as f64;
            }
        }
        let mean: Vec<f64> = sum.iter().map(|s| s / n as f64).collect();

        let mut sq = vec![0.0f64; c];
        for pixel in data.chunks_exact(c.max(1)) {
            for ((s, &v), &m) in sq.iter_mut().zip(pixel).zip(&mean) {
                let d = v as f64 - m;
                *s += d * d;
            }
        }

        Ok(Moments {
            mean: Tensor::from_vec(vec![c], mean.iter().map(|&m| m as f32).collect())?,
            variance: Tensor::from_vec(vec![c], sq.iter().map(|&s| (s / n as f64) as f32).collect())?,
        })
    }

    fn batch_norm(
        &self,
        input: &Tensor,
        moments: &Moments,
        offset: &Tensor,
        scale: &Tensor,
        epsilon: f32,
    ) -> Result<Tensor> {
        let (_, _, c) = image_dims("batch_norm", input)?;
        for param in [&moments.mean, &moments.variance, offset, scale] {
            if param.len() != c {
                return Err(Error::shape_mismatch("batch_norm", input.shape(), param.shape()));
            }
        }

        // y = x * inv + (offset - mean * inv), inv = scale / sqrt(var + eps)
        let inv: Vec<f32> = moments
            .variance
            .data()
            .iter()
            .zip(scale.data())
            .map(|(&var, &g)| g / (var + epsilon).sqrt())
            .collect();
        let shift: Vec<f32> = offset
            .data()
            .iter()
            .zip(moments.mean.data())
            .zip(&inv)
            .map(|((&b, &m), &k)| b - m * k)
            .collect();

        let mut out = input.data().to_vec();
        if c > 0 {
            out.par_chunks_mut(c).for_each(|pixel| {
                for ((v, &k), &s) in pixel.iter_mut().zip(&inv).zip(&shift) {
                    *v = *v * k + s;
                }
            });
        }
        Tensor::from_vec(input.shape().to_vec(), out)
    }

    fn concat_channels(&self, a: &Tensor, b: &Tensor) -> Result<Tensor> {
        let (h, w, ca) = image_dims("concat_channels", a)?;
        let (hb, wb, cb) = image_dims("concat_channels", b)?;
        if h != hb || w != wb {
            return Err(Error::shape_mismatch("concat_channels", a.shape(), b.shape()));
        }

        let c = ca + cb;
        let mut out = Vec::with_capacity(h * w * c);
        for p in 0..h * w {
            out.extend_from_slice(&a.data()[p * ca..(p + 1) * ca]);
            out.extend_from_slice(&b.data()[p * cb..(p + 1) * cb]);
        }
        Tensor::from_vec(vec![h, w, c], out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(shape: &[usize], data: Vec<f32>) -> Tensor {
        Tensor::from_vec(shape.to_vec(), data).unwrap()
    }

    fn ramp(shape: &[usize]) -> Tensor {
        let n: usize = shape.iter().product();
        t(shape, (0..n).map(|i| i as f32).collect())
    }

    #[test]
    fn test_bias_broadcast() {
        let engine = CpuEngine::new();
        let x = ramp(&[2, 1, 3]);
        let bias = t(&[3], vec![10.0, 20.0, 30.0]);
        let y = engine.add(&x, &bias).unwrap();
        assert_eq!(y.data(), &[10.0, 21.0, 32.0, 13.0, 24.0, 35.0]);

        let bad = t(&[2], vec![1.0, 2.0]);
        assert!(matches!(
            engine.add(&x, &bad),
            Err(Error::ShapeMismatch { op: "add", .. })
        ));
    }

    #[test]
    fn test_scalar_ops_and_activations() {
        let engine = CpuEngine::new();
        let x = t(&[4], vec![-2.0, -0.5, 0.0, 3.0]);
        assert_eq!(engine.relu(&x).data(), &[0.0, 0.0, 0.0, 3.0]);
        assert_eq!(engine.leaky_relu(&x, 0.2).data(), &[-0.4, -0.1, 0.0, 3.0]);
        assert_eq!(engine.sub_scalar(&engine.mul_scalar(&x, 2.0), 1.0).data(), &[-5.0, -2.0, -1.0, 5.0]);
        assert_eq!(engine.div_scalar(&x, 2.0).data(), &[-1.0, -0.25, 0.0, 1.5]);
        let th = engine.tanh(&x);
        assert!((th.data()[3] - 3.0f32.tanh()).abs() < 1e-7);
    }

    #[test]
    fn test_conv2d_same_shapes() {
        let engine = CpuEngine::new();
        let x = Tensor::full(vec![8, 6, 3], 1.0).unwrap();
        let k = Tensor::full(vec![4, 4, 3, 5], 0.1).unwrap();
        let y = engine.conv2d(&x, &k, 2, Padding::Same).unwrap();
        assert_eq!(y.shape(), &[4, 3, 5]);

        let x = Tensor::full(vec![1, 1, 2], 1.0).unwrap();
        let k = Tensor::full(vec![4, 4, 2, 1], 1.0).unwrap();
        let y = engine.conv2d(&x, &k, 2, Padding::Same).unwrap();
        assert_eq!(y.shape(), &[1, 1, 1]);
        // Only the centre tap overlaps the single pixel.
        assert_eq!(y.data(), &[2.0]);
    }

    #[test]
    fn test_conv2d_known_values() {
        let engine = CpuEngine::new();
        // 4x4 single channel ramp, 2x2 box filter, stride 2, no padding needed.
        let x = ramp(&[4, 4, 1]);
        let k = Tensor::full(vec![2, 2, 1, 1], 1.0).unwrap();
        let y = engine.conv2d(&x, &k, 2, Padding::Same).unwrap();
        assert_eq!(y.shape(), &[2, 2, 1]);
        assert_eq!(y.data(), &[10.0, 18.0, 42.0, 50.0]);

        let v = engine.conv2d(&x, &k, 2, Padding::Valid).unwrap();
        assert_eq!(v.data(), y.data());
    }

    #[test]
    fn test_conv2d_same_padding_offsets() {
        let engine = CpuEngine::new();
        // 4x4 kernel with a single tap at (1, 1): with pad 1 this samples
        // input pixel (2*oy, 2*ox).
        let x = ramp(&[4, 4, 1]);
        let mut k = vec![0.0; 16];
        k[5] = 1.0;
        let k = t(&[4, 4, 1, 1], k);
        let y = engine.conv2d(&x, &k, 2, Padding::Same).unwrap();
        assert_eq!(y.data(), &[0.0, 2.0, 8.0, 10.0]);
    }

    #[test]
    fn test_conv2d_channel_mismatch() {
        let engine = CpuEngine::new();
        let x = Tensor::zeros(vec![4, 4, 3]).unwrap();
        let k = Tensor::zeros(vec![4, 4, 2, 1]).unwrap();
        assert!(engine.conv2d(&x, &k, 2, Padding::Same).is_err());
        assert!(engine.conv2d(&x, &k, 0, Padding::Same).is_err());
    }

    #[test]
    fn test_conv2d_transpose_shapes() {
        let engine = CpuEngine::new();
        let x = Tensor::full(vec![2, 3, 4], 1.0).unwrap();
        let k = Tensor::full(vec![4, 4, 6, 4], 0.5).unwrap();
        let y = engine
            .conv2d_transpose(&x, &k, [4, 6, 6], 2, Padding::Same)
            .unwrap();
        assert_eq!(y.shape(), &[4, 6, 6]);

        // Output size inconsistent with the input under stride 2.
        assert!(engine
            .conv2d_transpose(&x, &k, [8, 6, 6], 2, Padding::Same)
            .is_err());
    }

    #[test]
    fn test_conv2d_transpose_single_tap_upsamples() {
        let engine = CpuEngine::new();
        // Tap (1, 1) with pad 1 scatters input (iy, ix) to output (2iy, 2ix).
        let x = t(&[2, 2, 1], vec![1.0, 2.0, 3.0, 4.0]);
        let mut k = vec![0.0; 16];
        k[5] = 1.0;
        let k = t(&[4, 4, 1, 1], k);
        let y = engine
            .conv2d_transpose(&x, &k, [4, 4, 1], 2, Padding::Same)
            .unwrap();
        let expected = [
            1.0, 0.0, 2.0, 0.0, //
            0.0, 0.0, 0.0, 0.0, //
            3.0, 0.0, 4.0, 0.0, //
            0.0, 0.0, 0.0, 0.0,
        ];
        assert_eq!(y.data(), &expected);
    }

    #[test]
    fn test_conv2d_transpose_is_adjoint_of_conv2d() {
        // <conv(x), y> == <x, conv_transpose(y)> for matching kernels.
        let engine = CpuEngine::new();
        let x = t(&[6, 4, 2], (0..48).map(|i| ((i * 7) % 11) as f32 - 5.0).collect());
        let y = t(&[3, 2, 3], (0..18).map(|i| ((i * 5) % 7) as f32 - 3.0).collect());

        // conv kernel [kh, kw, in=2, out=3]
        let conv_k: Vec<f32> = (0..4 * 4 * 2 * 3).map(|i| ((i * 3) % 13) as f32 * 0.1 - 0.6).collect();
        let conv_kernel = t(&[4, 4, 2, 3], conv_k.clone());

        // As a transposed kernel the same buffer reads [kh, kw, out=2, in=3].
        let trans_kernel = t(&[4, 4, 2, 3], conv_k);

        let cx = engine.conv2d(&x, &conv_kernel, 2, Padding::Same).unwrap();
        let ty = engine
            .conv2d_transpose(&y, &trans_kernel, [6, 4, 2], 2, Padding::Same)
            .unwrap();

        let lhs: f32 = cx.data().iter().zip(y.data()).map(|(a, b)| a * b).sum();
        let rhs: f32 = x.data().iter().zip(ty.data()).map(|(a, b)| a * b).sum();
        assert!((lhs - rhs).abs() < 1e-3, "{lhs} vs {rhs}");
    }

    #[test]
    fn test_moments_and_batch_norm() {
        let engine = CpuEngine::new();
        // channel 0: 1, 3, 5, 7; channel 1: constant 2
        let x = t(&[2, 2, 2], vec![1.0, 2.0, 3.0, 2.0, 5.0, 2.0, 7.0, 2.0]);
        let m = engine.moments(&x).unwrap();
        assert_eq!(m.mean.data(), &[4.0, 2.0]);
        assert_eq!(m.variance.data(), &[5.0, 0.0]);

        let gamma = t(&[2], vec![1.0, 1.0]);
        let beta = t(&[2], vec![0.0, 0.5]);
        let y = engine.batch_norm(&x, &m, &beta, &gamma, 1e-5).unwrap();
        let expected = (1.0f32 - 4.0) / (5.0f32 + 1e-5).sqrt();
        assert!((y.data()[0] - expected).abs() < 1e-5);
        // Zero variance channel collapses to the offset.
        assert!((y.data()[1] - 0.5).abs() < 1e-6);

        let short = t(&[1], vec![1.0]);
        assert!(engine.batch_norm(&x, &m, &short, &gamma, 1e-5).is_err());
    }

    #[test]
    fn test_concat_channels_order() {
        let engine = CpuEngine::new();
        let a = t(&[1, 2, 1], vec![1.0, 2.0]);
        let b = t(&[1, 2, 2], vec![10.0, 11.0, 20.0, 21.0]);
        let c = engine.concat_channels(&a, &b).unwrap();
        assert_eq!(c.shape(), &[1, 2, 3]);
        assert_eq!(c.data(), &[1.0, 10.0, 11.0, 2.0, 20.0, 21.0]);

        let d = t(&[2, 1, 1], vec![0.0, 0.0]);
        assert!(engine.concat_channels(&a, &d).is_err());
    }
}
