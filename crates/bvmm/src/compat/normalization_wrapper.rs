//! # Normalization Wrapper
//!
//! Provides support for the channel-first ``burn::nn::norm`` norm layers
//! which apply to ``[batch, channels, depth, height, width]`` volumes:
//! * [`Batch`] - [`BatchNorm`] (``BatchNorm3d``)
//! * [`Group`] - [`GroupNorm`]
//! * [`Instance`] - [`InstanceNorm`]
//!
//! ``LayerNorm`` normalizes the trailing dimension, and has no place
//! in a channel-first conv stack; it is not wrapped.
//!
//! The enum is non-exhaustive, to prepare for future additions.

use burn::module::Param;
use burn::nn::{
    BatchNorm, BatchNormConfig, GroupNorm, GroupNormConfig, InstanceNorm, InstanceNormConfig,
};
use burn::prelude::{Backend, Config, Module, Tensor};

/// ['Normalization'] Configuration.
///
/// The feature size of a config is frequently a placeholder (``0``),
/// which is replaced by [`NormalizationConfig::with_num_features`]
/// when the config is matched to a concrete conv layer.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum NormalizationConfig {
    /// ['`BatchNorm`'] Configuration.
    Batch(BatchNormConfig),

    /// ['`GroupNorm`'] Configuration.
    Group(GroupNormConfig),

    /// ['`InstanceNorm`'] Configuration.
    Instance(InstanceNormConfig),
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self::Batch(BatchNormConfig::new(0))
    }
}

impl From<BatchNormConfig> for NormalizationConfig {
    fn from(config: BatchNormConfig) -> Self {
        Self::Batch(config)
    }
}

impl From<GroupNormConfig> for NormalizationConfig {
    fn from(config: GroupNormConfig) -> Self {
        Self::Group(config)
    }
}

impl From<InstanceNormConfig> for NormalizationConfig {
    fn from(config: InstanceNormConfig) -> Self {
        Self::Instance(config)
    }
}

impl NormalizationConfig {
    /// Initialize a ['Norm'] layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Normalization<B> {
        match self {
            NormalizationConfig::Batch(config) => config.init(device).into(),
            NormalizationConfig::Group(config) => config.init(device).into(),
            NormalizationConfig::Instance(config) => config.init(device).into(),
        }
    }

    /// Adjust a norm config to the feature size.
    pub fn with_num_features(
        self,
        num_features: usize,
    ) -> Self {
        match self {
            NormalizationConfig::Batch(config) => BatchNormConfig {
                num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Group(config) => GroupNormConfig {
                num_channels: num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Instance(config) => InstanceNormConfig {
                num_channels: num_features,
                ..config
            }
            .into(),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            NormalizationConfig::Batch(config) => config.num_features,
            NormalizationConfig::Group(config) => config.num_channels,
            NormalizationConfig::Instance(config) => config.num_channels,
        }
    }
}

/// Normalization Layer Wrapper
///
/// Provides support for built-in ``burn::nn::norm`` norm layers:
/// * [`Batch`] - [`BatchNorm`], restricted to ``BatchNorm<3>``.
/// * [`Group`] - [`GroupNorm`]
/// * [`Instance`] - [`InstanceNorm`]
///
/// The enum is non-exhaustive, to prepare for future additions.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Normalization<B: Backend> {
    /// [`BatchNorm`] layer; restricted to `BatchNorm`<3>.
    Batch(BatchNorm<B, 3>),

    /// [`GroupNorm`] layer.
    Group(GroupNorm<B>),

    /// ['`InstanceNorm`'] layer.
    Instance(InstanceNorm<B>),
}

impl<B: Backend> From<BatchNorm<B, 3>> for Normalization<B> {
    fn from(layer: BatchNorm<B, 3>) -> Self {
        Self::Batch(layer)
    }
}

impl<B: Backend> From<GroupNorm<B>> for Normalization<B> {
    fn from(layer: GroupNorm<B>) -> Self {
        Self::Group(layer)
    }
}

impl<B: Backend> From<InstanceNorm<B>> for Normalization<B> {
    fn from(layer: InstanceNorm<B>) -> Self {
        Self::Instance(layer)
    }
}

impl<B: Backend> Normalization<B> {
    /// Applies normalization to a tensor.
    ///
    /// All wrapped layers expect a channel-first input of at least rank 3,
    /// and produce an output of the same rank and shape.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Normalization::Batch(norm) => norm.forward(input),
            Normalization::Group(norm) => norm.forward(input),
            Normalization::Instance(norm) => norm.forward(input),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            Normalization::Batch(norm) => norm.gamma.shape().dims[0],
            Normalization::Group(norm) => norm.num_channels,
            Normalization::Instance(norm) => norm.num_channels,
        }
    }

    /// The affine weight (gamma) of the layer, if it has one.
    pub fn weight(&self) -> Option<Tensor<B, 1>> {
        match self {
            Normalization::Batch(norm) => Some(norm.gamma.val()),
            Normalization::Group(norm) => norm.gamma.as_ref().map(|g| g.val()),
            Normalization::Instance(norm) => norm.gamma.as_ref().map(|g| g.val()),
        }
    }

    /// Fill the affine weight (gamma) with a constant.
    ///
    /// Layers without affine parameters are returned unchanged.
    pub fn with_constant_weight(
        self,
        value: f64,
    ) -> Self {
        let fill = |gamma: Param<Tensor<B, 1>>| gamma.map(|t| t.full_like(value));
        match self {
            Normalization::Batch(mut norm) => {
                norm.gamma = fill(norm.gamma);
                norm.into()
            }
            Normalization::Group(mut norm) => {
                norm.gamma = norm.gamma.map(fill);
                norm.into()
            }
            Normalization::Instance(mut norm) => {
                norm.gamma = norm.gamma.map(fill);
                norm.into()
            }
        }
    }
}
