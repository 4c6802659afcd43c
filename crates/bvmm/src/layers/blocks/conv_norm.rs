//! # `ConvNorm3d` Module
//!
//! A [`ConvNorm3d`] module is a [`Conv3d`] layer followed by a [`Normalization`] layer.

use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv3d, Conv3dConfig};
use burn::prelude::{Backend, Tensor};

/// [`ConvNorm3d`] Meta.
pub trait ConvNorm3dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of groups.
    fn groups(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Get the ``[depth, height, width]`` stride.
    fn stride(&self) -> [usize; 3];
}

/// [`ConvNorm3d`] Config.
#[derive(Config, Debug)]
pub struct ConvNorm3dConfig {
    /// The [`Conv3d`] config.
    pub conv: Conv3dConfig,

    /// The [`Normalization`] config.
    ///
    /// The feature size will be auto-matched.
    #[config(default = "NormalizationConfig::default()")]
    pub norm: NormalizationConfig,
}

impl ConvNorm3dMeta for ConvNorm3dConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn stride(&self) -> [usize; 3] {
        self.conv.stride
    }
}

impl From<Conv3dConfig> for ConvNorm3dConfig {
    fn from(conv: Conv3dConfig) -> Self {
        Self::new(conv)
    }
}

impl ConvNorm3dConfig {
    /// Initialize a [`ConvNorm3d`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvNorm3d<B> {
        let features = self.out_channels();
        ConvNorm3d {
            conv: self.conv.init(device),
            norm: self.norm.with_num_features(features).init(device),
        }
    }
}

/// [`Conv3d`] followed by a [`Normalization`] layer.
#[derive(Module, Debug)]
pub struct ConvNorm3d<B: Backend> {
    /// Internal Conv3d layer.
    pub conv: Conv3d<B>,

    /// Internal Norm Layer.
    pub norm: Normalization<B>,
}

impl<B: Backend> ConvNorm3dMeta for ConvNorm3d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn stride(&self) -> [usize; 3] {
        self.conv.stride
    }
}

impl<B: Backend> ConvNorm3d<B> {
    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        let x = self.conv.forward(input);
        self.norm.forward(x)
    }
}
