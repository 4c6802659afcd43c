//! # The `ResNet3d` Downsample Projection.
//!
//! A 1x1x1 conv + norm, applied to the identity path of a residual block
//! whenever the block changes resolution or channel count.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::conv_norm::{ConvNorm3d, ConvNorm3dConfig, ConvNorm3dMeta};
use crate::models::resnet3d::util::{conv_initializer, conv1x1x1, stride_output_resolution};
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Downsample3d`] Meta trait.
pub trait Downsample3dMeta {
    /// The size of the in channels dimension.
    fn in_channels(&self) -> usize;

    /// The size of the out channels dimension.
    fn out_channels(&self) -> usize;

    /// The stride of the downsample layer.
    fn stride(&self) -> usize;

    /// Get the ``[depth, height, width]`` output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> [usize; 3] {
        stride_output_resolution(input_resolution, self.stride())
    }
}

/// [`Downsample3d`] configuration.
///
/// Implements [`Downsample3dMeta`].
#[derive(Config, Debug)]
pub struct Downsample3dConfig {
    /// The size of the in channels dimension.
    pub in_channels: usize,

    /// The size of the out channels dimension.
    pub out_channels: usize,

    /// The stride of the downsample layer.
    #[config(default = 1)]
    pub stride: usize,

    /// The [`crate::compat::normalization_wrapper::Normalization`] config.
    ///
    /// The feature size will be auto-matched.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// The conv initializer.
    #[config(default = "conv_initializer(&ActivationConfig::Relu)")]
    pub initializer: Initializer,
}

impl Downsample3dMeta for Downsample3dConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl Downsample3dConfig {
    /// Initialize a [`Downsample3d`] `Module`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Downsample3d<B> {
        let config = ConvNorm3dConfig::new(
            conv1x1x1(self.in_channels, self.out_channels, self.stride)
                .with_initializer(self.initializer.clone()),
        )
        .with_norm(self.normalization.clone());

        Downsample3d {
            conv_norm: config.init(device),
        }
    }
}

/// Downsample layer; a 1x1x1 conv to reduce the resolution and adjust the number of channels.
///
/// Maps ``[batch, in_channels, in_depth, in_height, in_width]`` to
/// ``[batch, out_channels, out_depth, out_height, out_width]`` tensors.
///
/// Implements [`Downsample3dMeta`].
#[derive(Module, Debug)]
pub struct Downsample3d<B: Backend> {
    /// Embedded conv/norm.
    pub conv_norm: ConvNorm3d<B>,
}

impl<B: Backend> Downsample3dMeta for Downsample3d<B> {
    fn in_channels(&self) -> usize {
        self.conv_norm.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.conv_norm.out_channels()
    }

    fn stride(&self) -> usize {
        self.conv_norm.stride()[0]
    }
}

impl<B: Backend> Downsample3d<B> {
    /// Forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        self.conv_norm.forward(input)
    }
}
