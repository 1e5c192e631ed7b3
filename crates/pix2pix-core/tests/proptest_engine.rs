//! Property-based tests for the CPU engine.
//!
//! - "Same" convolutions produce `ceil(input / stride)` outputs
//! - Transposed convolutions invert that size mapping
//! - Normalized activations have zero mean per channel
//!
//! Run with: cargo test -p pix2pix-core --test proptest_engine

use pix2pix_core::{CpuEngine, Padding, Tensor, TensorEngine};
use proptest::prelude::*;

fn values(len: usize) -> Vec<f32> {
    (0..len).map(|i| ((i * 37 % 11) as f32 - 5.0) / 5.0).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 50,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    })]

    /// Property: "same" output size is independent of kernel size.
    #[test]
    fn prop_same_conv_output_size(
        h in 1usize..12,
        w in 1usize..12,
        k in 1usize..5,
        stride in 1usize..4,
        cin in 1usize..3,
        cout in 1usize..3,
    ) {
        let engine = CpuEngine::new();
        let input = Tensor::from_vec(vec![h, w, cin], values(h * w * cin)).unwrap();
        let filter = Tensor::from_vec(vec![k, k, cin, cout], values(k * k * cin * cout)).unwrap();

        let out = engine.conv2d(&input, &filter, stride, Padding::Same).unwrap();
        prop_assert_eq!(out.shape(), &[h.div_ceil(stride), w.div_ceil(stride), cout][..]);
    }

    /// Property: a stride-s transposed convolution maps `n` back to `n * s`.
    #[test]
    fn prop_transpose_upsamples(
        h in 1usize..8,
        w in 1usize..8,
        k in 1usize..5,
        stride in 1usize..4,
        cin in 1usize..3,
        cout in 1usize..3,
    ) {
        let engine = CpuEngine::new();
        let input = Tensor::from_vec(vec![h, w, cin], values(h * w * cin)).unwrap();
        let filter = Tensor::from_vec(vec![k, k, cout, cin], values(k * k * cin * cout)).unwrap();

        let out = engine
            .conv2d_transpose(&input, &filter, [h * stride, w * stride, cout], stride, Padding::Same)
            .unwrap();
        prop_assert_eq!(out.shape(), &[h * stride, w * stride, cout][..]);
        prop_assert!(out.data().iter().all(|v| v.is_finite()));
    }

    /// Property: batch norm with unit scale and zero offset centers each channel.
    #[test]
    fn prop_batch_norm_centers(
        data in prop::collection::vec(-10.0f32..10.0, 2 * 3 * 2),
    ) {
        let engine = CpuEngine::new();
        let x = Tensor::from_vec(vec![2, 3, 2], data).unwrap();
        let moments = engine.moments(&x).unwrap();
        let ones = Tensor::full(vec![2], 1.0).unwrap();
        let zeros = Tensor::zeros(vec![2]).unwrap();
        let y = engine.batch_norm(&x, &moments, &zeros, &ones, 1e-5).unwrap();

        let centered = engine.moments(&y).unwrap();
        for &m in centered.mean.data() {
            prop_assert!(m.abs() < 1e-4, "mean {}", m);
        }
    }
}

#[test]
fn test_same_padding_matches_reference_sizes() {
    // 256 -> 128 with a 4x4 stride-2 kernel pads one row before, one after.
    assert_eq!(Padding::Same.output_len(256, 4, 2), 128);
    assert_eq!(Padding::Same.pad_before(256, 4, 2), 1);
    assert_eq!(Padding::Same.pad_before(2, 4, 2), 1);
    assert_eq!(Padding::Same.pad_before(1, 4, 2), 1);
}
