//! Generator output checked against a naive f64 forward pass.
//!
//! The reference below is written directly from the layer definitions:
//! scatter-style transposed convolution, two-pass batch normalization and
//! explicit skip concatenation. It shares no code with the engine.
//!
//! Run with: cargo test -p pix2pix --test reference_forward

use pix2pix::testing::{gradient_image, KernelFill, SyntheticGenerator};
use pix2pix::{Pipeline, Tensor, WeightMap};

/// Max abs difference allowed between the pipeline and the reference.
const TOLERANCE: f64 = 2e-4;

/// Variations of the reference wiring.
#[derive(Clone, Copy)]
struct Wiring {
    epsilon: f64,
    /// Concatenate `[skip, previous]` instead of `[previous, skip]`
    skip_first: bool,
}

const GENERATOR: Wiring = Wiring {
    epsilon: 1e-5,
    skip_first: false,
};

#[derive(Clone)]
struct Image {
    h: usize,
    w: usize,
    c: usize,
    data: Vec<f64>,
}

impl Image {
    fn zeros(h: usize, w: usize, c: usize) -> Self {
        Self {
            h,
            w,
            c,
            data: vec![0.0; h * w * c],
        }
    }

    fn at(&self, y: usize, x: usize, c: usize) -> f64 {
        self.data[(y * self.w + x) * self.c + c]
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            data: self.data.iter().map(|&v| f(v)).collect(),
            ..self.clone()
        }
    }
}

/// Output size and leading pad of a stride-`s` "same" convolution.
fn same(input: usize, kernel: usize, stride: usize) -> (usize, usize) {
    let out = (input + stride - 1) / stride;
    let total = ((out - 1) * stride + kernel).saturating_sub(input);
    (out, total / 2)
}

fn tensor<'a>(weights: &'a WeightMap, key: &str) -> &'a Tensor {
    weights.get(key).unwrap()
}

/// Kernel layout `[kh, kw, in, out]`.
fn conv(x: &Image, kernel: &Tensor, stride: usize) -> Image {
    let (kh, kw, cin, cout) = kernel.dims4().unwrap();
    assert_eq!(cin, x.c);
    let k = kernel.data();
    let (oh, pad_top) = same(x.h, kh, stride);
    let (ow, pad_left) = same(x.w, kw, stride);

    let mut out = Image::zeros(oh, ow, cout);
    for oy in 0..oh {
        for ox in 0..ow {
            for co in 0..cout {
                let mut acc = 0.0;
                for ky in 0..kh {
                    for kx in 0..kw {
                        let iy = (oy * stride + ky) as isize - pad_top as isize;
                        let ix = (ox * stride + kx) as isize - pad_left as isize;
                        if iy < 0 || ix < 0 || iy >= x.h as isize || ix >= x.w as isize {
                            continue;
                        }
                        for ci in 0..cin {
                            let weight = k[((ky * kw + kx) * cin + ci) * cout + co] as f64;
                            acc += x.at(iy as usize, ix as usize, ci) * weight;
                        }
                    }
                }
                out.data[(oy * ow + ox) * cout + co] = acc;
            }
        }
    }
    out
}

/// Kernel layout `[kh, kw, out, in]`; every input pixel scatters its taps.
fn conv_transpose(x: &Image, kernel: &Tensor, stride: usize) -> Image {
    let (kh, kw, cout, cin) = kernel.dims4().unwrap();
    assert_eq!(cin, x.c);
    let k = kernel.data();
    let (oh, ow) = (x.h * stride, x.w * stride);
    let (_, pad_top) = same(oh, kh, stride);
    let (_, pad_left) = same(ow, kw, stride);

    let mut out = Image::zeros(oh, ow, cout);
    for iy in 0..x.h {
        for ix in 0..x.w {
            for ky in 0..kh {
                for kx in 0..kw {
                    let oy = (iy * stride + ky) as isize - pad_top as isize;
                    let ox = (ix * stride + kx) as isize - pad_left as isize;
                    if oy < 0 || ox < 0 || oy >= oh as isize || ox >= ow as isize {
                        continue;
                    }
                    let base = (oy as usize * ow + ox as usize) * cout;
                    for co in 0..cout {
                        for ci in 0..cin {
                            let weight = k[((ky * kw + kx) * cout + co) * cin + ci] as f64;
                            out.data[base + co] += x.at(iy, ix, ci) * weight;
                        }
                    }
                }
            }
        }
    }
    out
}

fn add_bias(x: &Image, bias: &Tensor) -> Image {
    let mut out = x.clone();
    for (i, v) in out.data.iter_mut().enumerate() {
        *v += bias.data()[i % x.c] as f64;
    }
    out
}

fn batch_norm(x: &Image, gamma: &Tensor, beta: &Tensor, epsilon: f64) -> Image {
    let n = (x.h * x.w) as f64;
    let mut out = x.clone();
    for c in 0..x.c {
        let values = || x.data.iter().skip(c).step_by(x.c);
        let mean = values().sum::<f64>() / n;
        let variance = values().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let scale = gamma.data()[c] as f64 / (variance + epsilon).sqrt();
        let offset = beta.data()[c] as f64;
        for v in out.data.iter_mut().skip(c).step_by(x.c) {
            *v = (*v - mean) * scale + offset;
        }
    }
    out
}

fn concat(a: &Image, b: &Image) -> Image {
    let mut out = Image::zeros(a.h, a.w, a.c + b.c);
    out.data.clear();
    for p in 0..a.h * a.w {
        out.data.extend_from_slice(&a.data[p * a.c..(p + 1) * a.c]);
        out.data.extend_from_slice(&b.data[p * b.c..(p + 1) * b.c]);
    }
    out
}

fn forward(weights: &WeightMap, input: &Tensor, wiring: Wiring) -> Vec<f64> {
    let (h, w, c) = input.dims3().unwrap();
    let x = Image {
        h,
        w,
        c,
        data: input.data().iter().map(|&v| v as f64 / 255.0 * 2.0 - 1.0).collect(),
    };

    let norm = |x: &Image, scope: &str| {
        batch_norm(
            x,
            tensor(weights, &format!("{scope}/batch_normalization/gamma")),
            tensor(weights, &format!("{scope}/batch_normalization/beta")),
            wiring.epsilon,
        )
    };

    // Encoder 1 is the bare convolution.
    let mut encoders = vec![conv(&x, tensor(weights, "generator/encoder_1/conv2d/kernel"), 2)];
    for i in 2..=8 {
        let scope = format!("generator/encoder_{i}");
        let prev = encoders[i - 2].map(|v| if v < 0.0 { 0.2 * v } else { v });
        let y = conv(&prev, tensor(weights, &format!("{scope}/conv2d/kernel")), 2);
        let y = add_bias(&y, tensor(weights, &format!("{scope}/conv2d/bias")));
        encoders.push(norm(&y, &scope));
    }

    let mut d = encoders[7].clone();
    for i in (1..=8).rev() {
        let scope = format!("generator/decoder_{i}");
        let joined = if i == 8 {
            d.clone()
        } else if wiring.skip_first {
            concat(&encoders[i - 1], &d)
        } else {
            concat(&d, &encoders[i - 1])
        };
        let activated = joined.map(|v| v.max(0.0));
        let y = conv_transpose(
            &activated,
            tensor(weights, &format!("{scope}/conv2d_transpose/kernel")),
            2,
        );
        let y = add_bias(&y, tensor(weights, &format!("{scope}/conv2d_transpose/bias")));
        d = if i == 1 { y.map(f64::tanh) } else { norm(&y, &scope) };
    }

    d.data.iter().map(|v| (v + 1.0) / 2.0).collect()
}

fn max_diff(actual: &[f32], expected: &[f64]) -> f64 {
    assert_eq!(actual.len(), expected.len());
    actual
        .iter()
        .zip(expected)
        .map(|(&a, &e)| (a as f64 - e).abs())
        .fold(0.0, f64::max)
}

fn generator() -> WeightMap {
    SyntheticGenerator::new(1)
        .with_fill(KernelFill::Pattern {
            seed: 3,
            scale: 0.05,
        })
        .weights()
}

#[test]
fn test_matches_reference_forward_pass() {
    let weights = generator();
    let input = gradient_image(256, 256);
    let output = Pipeline::default().run(&weights, &input).unwrap();

    let expected = forward(&weights, &input, GENERATOR);
    let diff = max_diff(output.data(), &expected);
    assert!(diff < TOLERANCE, "max abs difference {}", diff);
}

#[test]
fn test_skip_order_and_epsilon_move_the_output() {
    let weights = generator();
    let input = gradient_image(256, 256);
    let output = Pipeline::default().run(&weights, &input).unwrap();

    // Each variation must land well outside the tolerance above, so the
    // pipeline cannot match the reference with either one changed.
    let swapped = forward(
        &weights,
        &input,
        Wiring {
            skip_first: true,
            ..GENERATOR
        },
    );
    let diff = max_diff(output.data(), &swapped);
    assert!(diff > 10.0 * TOLERANCE, "skip order changed output by only {}", diff);

    let loose = forward(
        &weights,
        &input,
        Wiring {
            epsilon: 1e-2,
            ..GENERATOR
        },
    );
    let diff = max_diff(output.data(), &loose);
    assert!(diff > 10.0 * TOLERANCE, "epsilon changed output by only {}", diff);
}

#[test]
fn test_reference_padding() {
    assert_eq!(same(256, 4, 2), (128, 1));
    assert_eq!(same(2, 4, 2), (1, 1));
    assert_eq!(same(3, 4, 2), (2, 1));
}
