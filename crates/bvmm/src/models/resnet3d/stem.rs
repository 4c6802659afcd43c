//! # Input Stem
//!
//! A single anisotropic conv/norm/act:
//! * kernel ``[2, 5, 5]``,
//! * stride ``[1, 3, 3]``,
//! * padding ``1`` on every axis,
//! * no bias.
//!
//! The temporal (depth) axis is not reduced; it grows by one.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA3dConfig, CNA3d, CNA3dMeta};
use crate::models::resnet3d::util::{conv_initializer, conv_output_size};
use burn::nn::conv::Conv3dConfig;
use burn::nn::{Initializer, PaddingConfig3d};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Stem conv kernel, ``[depth, height, width]``.
pub const STEM_KERNEL_SIZE: [usize; 3] = [2, 5, 5];

/// Stem conv stride, ``[depth, height, width]``.
pub const STEM_STRIDE: [usize; 3] = [1, 3, 3];

/// Stem conv padding, on every axis.
pub const STEM_PADDING: usize = 1;

/// [`Stem3d`] Meta trait.
pub trait Stem3dMeta {
    /// Input channels.
    fn in_channels(&self) -> usize;

    /// Output channels.
    fn out_channels(&self) -> usize;

    /// Get the ``[depth, height, width]`` output resolution for a given input resolution.
    ///
    /// Returns `None` if the input is smaller than the stem kernel.
    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> Option<[usize; 3]> {
        let mut output = [0; 3];
        for axis in 0..3 {
            output[axis] = conv_output_size(
                input_resolution[axis],
                STEM_KERNEL_SIZE[axis],
                STEM_STRIDE[axis],
                STEM_PADDING,
                1,
            )?;
        }
        Some(output)
    }
}

/// [`Stem3d`] Config.
#[derive(Config, Debug)]
pub struct Stem3dConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels; the stem width.
    pub out_channels: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,

    /// The conv initializer.
    #[config(default = "conv_initializer(&ActivationConfig::Relu)")]
    pub initializer: Initializer,
}

impl Stem3dMeta for Stem3dConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl Stem3dConfig {
    /// Initialize a [`Stem3d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Stem3d<B> {
        let cna = AbstractCNA3dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        }
        .build_config(
            Conv3dConfig::new([self.in_channels, self.out_channels], STEM_KERNEL_SIZE)
                .with_stride(STEM_STRIDE)
                .with_padding(PaddingConfig3d::Explicit(
                    STEM_PADDING,
                    STEM_PADDING,
                    STEM_PADDING,
                ))
                .with_bias(false)
                .with_initializer(self.initializer.clone()),
        );

        Stem3d {
            cna: cna.init(device),
        }
    }
}

/// `ResNet3d` input stem.
#[derive(Module, Debug)]
pub struct Stem3d<B: Backend> {
    /// The conv/norm/act.
    pub cna: CNA3d<B>,
}

impl<B: Backend> Stem3dMeta for Stem3d<B> {
    fn in_channels(&self) -> usize {
        self.cna.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.cna.out_channels()
    }
}

impl<B: Backend> Stem3d<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, depth + 1, (height - 3) / 3 + 1, (width - 3) / 3 + 1]``
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        self.cna.forward(input)
    }
}
