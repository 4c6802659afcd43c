//! # Residual Block Wrapper

use crate::models::resnet3d::basic_block::{
    BASIC_BLOCK_EXPANSION, BasicBlock3d, BasicBlock3dConfig, BasicBlock3dMeta,
};
use crate::models::resnet3d::bottleneck::{
    BOTTLENECK_BLOCK_EXPANSION, BottleneckBlock3d, BottleneckBlock3dConfig, BottleneckBlock3dMeta,
};
use crate::models::resnet3d::downsample::Downsample3dConfig;
use crate::models::resnet3d::util::stride_output_resolution;
use burn::config::Config;
use burn::nn::conv::Conv3d;
use burn::prelude::{Backend, Module, Tensor};

/// The residual block variant of a network.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ResidualBlockKind {
    /// [`BasicBlock3d`]; two 3x3x3 convs, expansion 1.
    Basic,

    /// [`BottleneckBlock3d`]; 1x1x1 / 3x3x3 / 1x1x1 convs, expansion 4.
    Bottleneck,
}

impl ResidualBlockKind {
    /// The channel expansion of the block variant.
    pub fn expansion(&self) -> usize {
        match self {
            Self::Basic => BASIC_BLOCK_EXPANSION,
            Self::Bottleneck => BOTTLENECK_BLOCK_EXPANSION,
        }
    }

    /// The output width of the network stem for this variant.
    pub fn stem_width(&self) -> usize {
        match self {
            Self::Basic => 32,
            Self::Bottleneck => 128,
        }
    }

    /// Start a block config of this variant.
    pub fn block_config(
        &self,
        in_planes: usize,
        planes: usize,
    ) -> ResidualBlock3dConfig {
        match self {
            Self::Basic => BasicBlock3dConfig::new(in_planes, planes).into(),
            Self::Bottleneck => BottleneckBlock3dConfig::new(in_planes, planes).into(),
        }
    }
}

/// [`ResidualBlock3d`] Meta API.
pub trait ResidualBlock3dMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of convolution.
    fn stride(&self) -> usize;

    /// Get the ``[depth, height, width]`` output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> [usize; 3] {
        stride_output_resolution(input_resolution, self.stride())
    }
}

/// [`ResidualBlock3d`] Config.
#[derive(Config, Debug)]
pub enum ResidualBlock3dConfig {
    /// A [`BasicBlock3d`].
    Basic(BasicBlock3dConfig),

    /// A [`BottleneckBlock3d`].
    Bottleneck(BottleneckBlock3dConfig),
}

impl ResidualBlock3dMeta for ResidualBlock3dConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.in_planes(),
            Self::Bottleneck(config) => config.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.out_planes(),
            Self::Bottleneck(config) => config.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(config) => config.stride(),
            Self::Bottleneck(config) => config.stride(),
        }
    }
}

impl From<BasicBlock3dConfig> for ResidualBlock3dConfig {
    fn from(config: BasicBlock3dConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<BottleneckBlock3dConfig> for ResidualBlock3dConfig {
    fn from(config: BottleneckBlock3dConfig) -> Self {
        Self::Bottleneck(config)
    }
}

/// Apply a ``with_*`` setter to whichever block config is wrapped.
macro_rules! delegate_with {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Set `", stringify!($name), "` on the wrapped config.")]
        pub fn $name(
            self,
            value: $ty,
        ) -> Self {
            match self {
                Self::Basic(config) => config.$name(value).into(),
                Self::Bottleneck(config) => config.$name(value).into(),
            }
        }
    };
}

impl ResidualBlock3dConfig {
    delegate_with!(with_stride, usize);
    delegate_with!(with_downsample, Option<Downsample3dConfig>);
    delegate_with!(with_groups, usize);
    delegate_with!(with_base_width, usize);
    delegate_with!(with_dilation, usize);
    delegate_with!(
        with_normalization,
        crate::compat::normalization_wrapper::NormalizationConfig
    );
    delegate_with!(
        with_activation,
        crate::compat::activation_wrapper::ActivationConfig
    );
    delegate_with!(with_initializer, burn::nn::Initializer);

    /// The block variant.
    pub fn kind(&self) -> ResidualBlockKind {
        match self {
            Self::Basic(_) => ResidualBlockKind::Basic,
            Self::Bottleneck(_) => ResidualBlockKind::Bottleneck,
        }
    }

    /// The identity-path projection, if any.
    pub fn downsample(&self) -> Option<&Downsample3dConfig> {
        match self {
            Self::Basic(config) => config.downsample.as_ref(),
            Self::Bottleneck(config) => config.downsample.as_ref(),
        }
    }

    /// The middle conv dilation.
    pub fn dilation(&self) -> usize {
        match self {
            Self::Basic(config) => config.dilation,
            Self::Bottleneck(config) => config.dilation(),
        }
    }

    /// Check the wrapped config.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        match self {
            Self::Basic(config) => config.try_validate(),
            Self::Bottleneck(config) => config.try_validate(),
        }
    }

    /// Initialize a [`ResidualBlock3d`].
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> anyhow::Result<ResidualBlock3d<B>> {
        Ok(match self {
            Self::Basic(config) => config.clone().try_init(device)?.into(),
            Self::Bottleneck(config) => config.clone().try_init(device)?.into(),
        })
    }

    /// Initialize a [`ResidualBlock3d`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualBlock3d<B> {
        match self.try_init(device) {
            Ok(block) => block,
            Err(err) => panic!("{err}"),
        }
    }
}

/// A [`BasicBlock3d`] or [`BottleneckBlock3d`] wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ResidualBlock3d<B: Backend> {
    /// A [`BasicBlock3d`].
    Basic(BasicBlock3d<B>),

    /// A [`BottleneckBlock3d`].
    Bottleneck(BottleneckBlock3d<B>),
}

impl<B: Backend> From<BasicBlock3d<B>> for ResidualBlock3d<B> {
    fn from(block: BasicBlock3d<B>) -> Self {
        Self::Basic(block)
    }
}

impl<B: Backend> From<BottleneckBlock3d<B>> for ResidualBlock3d<B> {
    fn from(block: BottleneckBlock3d<B>) -> Self {
        Self::Bottleneck(block)
    }
}

impl<B: Backend> ResidualBlock3dMeta for ResidualBlock3d<B> {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.in_planes(),
            Self::Bottleneck(block) => block.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.out_planes(),
            Self::Bottleneck(block) => block.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(block) => block.stride(),
            Self::Bottleneck(block) => block.stride(),
        }
    }
}

impl<B: Backend> ResidualBlock3d<B> {
    /// Apply the wrapped block to the input.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_depth, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_depth, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 5> {
        match self {
            Self::Basic(block) => block.forward(input),
            Self::Bottleneck(block) => block.forward(input),
        }
    }

    /// Is there a downsample projection on the identity path?
    pub fn has_downsample(&self) -> bool {
        match self {
            Self::Basic(block) => block.downsample.is_some(),
            Self::Bottleneck(block) => block.downsample.is_some(),
        }
    }

    /// The normalization applied just before the residual add.
    pub fn last_norm(&self) -> &crate::compat::normalization_wrapper::Normalization<B> {
        match self {
            Self::Basic(block) => &block.cna2.norm,
            Self::Bottleneck(block) => &block.cna3.norm,
        }
    }

    /// The block's convs, by field path; the downsample conv last.
    pub fn named_convs(&self) -> Vec<(&'static str, &Conv3d<B>)> {
        let (mut convs, downsample) = match self {
            Self::Basic(block) => (
                vec![("cna1.conv", &block.cna1.conv), ("cna2.conv", &block.cna2.conv)],
                &block.downsample,
            ),
            Self::Bottleneck(block) => (
                vec![
                    ("cna1.conv", &block.cna1.conv),
                    ("cna2.conv", &block.cna2.conv),
                    ("cna3.conv", &block.cna3.conv),
                ],
                &block.downsample,
            ),
        };
        if let Some(downsample) = downsample {
            convs.push(("downsample.conv_norm.conv", &downsample.conv_norm.conv));
        }
        convs
    }

    /// Zero the last norm weight of the wrapped block.
    pub fn zero_init_residual(self) -> Self {
        match self {
            Self::Basic(block) => block.zero_init_residual().into(),
            Self::Bottleneck(block) => block.zero_init_residual().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_kind() {
        assert_eq!(ResidualBlockKind::Basic.expansion(), 1);
        assert_eq!(ResidualBlockKind::Bottleneck.expansion(), 4);
        assert_eq!(ResidualBlockKind::Basic.stem_width(), 32);
        assert_eq!(ResidualBlockKind::Bottleneck.stem_width(), 128);

        let config = ResidualBlockKind::Bottleneck.block_config(32, 16);
        assert_eq!(config.kind(), ResidualBlockKind::Bottleneck);
        assert_eq!(config.in_planes(), 32);
        assert_eq!(config.out_planes(), 64);

        let config = ResidualBlockKind::Basic.block_config(32, 16);
        assert_eq!(config.kind(), ResidualBlockKind::Basic);
        assert_eq!(config.out_planes(), 16);
    }

    #[test]
    fn test_delegated_setters() {
        let config = ResidualBlockKind::Bottleneck
            .block_config(8, 4)
            .with_stride(2)
            .with_dilation(2)
            .with_downsample(Some(Downsample3dConfig::new(8, 16).with_stride(2)));
        assert_eq!(config.stride(), 2);
        assert_eq!(config.dilation(), 2);
        assert_eq!(config.output_resolution([4, 8, 8]), [2, 4, 4]);
        assert_eq!(config.downsample().map(|d| d.out_channels), Some(16));

        let config = ResidualBlockKind::Basic.block_config(8, 8).with_dilation(2);
        assert!(config.try_validate().is_err());
        assert!(config.try_init::<NdArray<f32>>(&Default::default()).is_err());
    }

    #[test]
    fn test_residual_block() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ResidualBlock3d<B> = ResidualBlockKind::Basic
            .block_config(4, 8)
            .with_downsample(Some(Downsample3dConfig::new(4, 8)))
            .init(&device);
        assert_eq!(block.in_planes(), 4);
        assert_eq!(block.out_planes(), 8);
        assert_eq!(block.stride(), 1);
        assert!(block.has_downsample());

        let output = block.forward(Tensor::ones([1, 4, 2, 3, 3], &device));
        assert_eq!(output.dims(), [1, 8, 2, 3, 3]);

        let block = block.zero_init_residual();
        block
            .last_norm()
            .weight()
            .unwrap()
            .to_data()
            .assert_eq(&Tensor::<B, 1>::zeros([8], &device).to_data(), true);
    }

    #[test]
    fn test_named_convs() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: ResidualBlock3d<B> = ResidualBlockKind::Basic.block_config(8, 8).init(&device);
        let names: Vec<_> = block.named_convs().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["cna1.conv", "cna2.conv"]);

        let block: ResidualBlock3d<B> = ResidualBlockKind::Bottleneck
            .block_config(8, 4)
            .with_downsample(Some(Downsample3dConfig::new(8, 16)))
            .init(&device);
        let convs = block.named_convs();
        assert_eq!(convs.len(), 4);
        assert_eq!(convs[3].0, "downsample.conv_norm.conv");
        assert_eq!(convs[3].1.weight.dims(), [16, 8, 1, 1, 1]);
        assert_eq!(convs[1].1.weight.dims(), [4, 4, 3, 3, 3]);
    }
}
