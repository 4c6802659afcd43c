//! # `ResNet3d` Utilities
use crate::compat::activation_wrapper::ActivationConfig;
use burn::nn::conv::Conv3dConfig;
use burn::nn::{Initializer, PaddingConfig3d};

/// Expand a scalar to a ``[depth, height, width]`` array.
#[inline(always)]
pub fn scalar_to_array3(value: usize) -> [usize; 3] {
    [value; 3]
}

/// Kaiming-normal, fan-out conv initializer, with the gain matched to `activation`.
pub fn conv_initializer(activation: &ActivationConfig) -> Initializer {
    Initializer::KaimingNormal {
        gain: activation.kaiming_gain(),
        fan_out_only: true,
    }
}

/// 3x3x3 convolution, padded to preserve extent at stride 1.
///
/// # Arguments
///
/// - `in_planes`: input channels.
/// - `out_planes`: output channels.
/// - `stride`: uniform stride.
/// - `groups`: channel groups.
/// - `dilation`: uniform dilation; also used as the padding.
pub fn conv3x3x3(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
    groups: usize,
    dilation: usize,
) -> Conv3dConfig {
    Conv3dConfig::new([in_planes, out_planes], scalar_to_array3(3))
        .with_stride(scalar_to_array3(stride))
        .with_padding(PaddingConfig3d::Explicit(dilation, dilation, dilation))
        .with_groups(groups)
        .with_dilation(scalar_to_array3(dilation))
        .with_bias(false)
}

/// 1x1x1 convolution, unpadded.
pub fn conv1x1x1(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
) -> Conv3dConfig {
    Conv3dConfig::new([in_planes, out_planes], scalar_to_array3(1))
        .with_stride(scalar_to_array3(stride))
        .with_padding(PaddingConfig3d::Explicit(0, 0, 0))
        .with_bias(false)
}

/// Output extent of a convolution along one axis.
///
/// Returns `None` when the padded input is smaller than the dilated kernel.
pub fn conv_output_size(
    input: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> Option<usize> {
    let span = dilation * (kernel_size - 1) + 1;
    let padded = input + 2 * padding;
    if padded < span {
        return None;
    }
    Some((padded - span) / stride + 1)
}

/// Output resolution of a "same"-padded conv (3x3x3 or 1x1x1) under `stride`.
///
/// ``out = ceil(in / stride)`` on every axis.
pub fn stride_output_resolution(
    input_resolution: [usize; 3],
    stride: usize,
) -> [usize; 3] {
    input_resolution.map(|x| x.div_ceil(stride))
}
