//! Test helpers.
use burn::prelude::{Backend, ElementConversion, Tensor};

/// Assert that two float tensors agree within ``tolerance`` (max abs difference).
pub fn assert_close<B: Backend, const D: usize>(
    actual: Tensor<B, D>,
    expected: Tensor<B, D>,
    tolerance: f32,
) {
    assert_eq!(actual.dims(), expected.dims());
    let diff: f32 = (actual - expected).abs().max().into_scalar().elem();
    assert!(
        diff <= tolerance,
        "max abs difference {diff} exceeds {tolerance}"
    );
}

/// The Kaiming-normal (fan-out) standard deviation for a conv weight.
pub fn kaiming_fan_out_std(
    gain: f64,
    out_channels: usize,
    kernel_numel: usize,
) -> f64 {
    gain / ((out_channels * kernel_numel) as f64).sqrt()
}
