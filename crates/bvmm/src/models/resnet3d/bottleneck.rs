//! # Bottleneck Block for `ResNet3d`
//!
//! [`BottleneckBlock3d`] is the ``1x1x1 -> 3x3x3 -> 1x1x1`` residual unit
//! used by the deep (50/101/152) variants.
//!
//! [`BottleneckBlock3dMeta`] defines a common meta API for [`BottleneckBlock3d`]
//! and [`BottleneckBlock3dConfig`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA3dConfig, CNA3d, CNA3dMeta};
use crate::models::resnet3d::downsample::{Downsample3d, Downsample3dConfig};
use crate::models::resnet3d::util::{
    conv_initializer, conv1x1x1, conv3x3x3, stride_output_resolution,
};
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Channel expansion of [`BottleneckBlock3d`].
pub const BOTTLENECK_BLOCK_EXPANSION: usize = 4;

/// [`BottleneckBlock3d`] Meta trait.
pub trait BottleneckBlock3dMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// Configures the size of `width` and `out_planes`.
    fn planes(&self) -> usize;

    /// Groups of the middle conv.
    fn groups(&self) -> usize;

    /// Dilation of the middle conv.
    fn dilation(&self) -> usize;

    /// The expansion factor of the block; always 4.
    fn expansion(&self) -> usize {
        BOTTLENECK_BLOCK_EXPANSION
    }

    /// Inner width; the channels of the middle conv.
    fn width(&self) -> usize;

    /// The number of output feature planes.
    ///
    /// ``out_planes = planes * expansion``
    fn out_planes(&self) -> usize {
        self.planes() * self.expansion()
    }

    /// The stride of the middle conv.
    fn stride(&self) -> usize;

    /// Get the ``[depth, height, width]`` output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> [usize; 3] {
        stride_output_resolution(input_resolution, self.stride())
    }
}

/// [`BottleneckBlock3d`] Config.
///
/// Implements [`BottleneckBlock3dMeta`].
#[derive(Config, Debug)]
pub struct BottleneckBlock3dConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Configures the size of `width` and `out_planes`.
    pub planes: usize,

    /// The stride of the middle conv.
    #[config(default = 1)]
    pub stride: usize,

    /// Optional projection of the identity path.
    #[config(default = "None")]
    pub downsample: Option<Downsample3dConfig>,

    /// Groups of the middle conv.
    #[config(default = 1)]
    pub groups: usize,

    /// Base width used to determine the inner width.
    #[config(default = 64)]
    pub base_width: usize,

    /// Dilation of the middle conv.
    #[config(default = 1)]
    pub dilation: usize,

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

impl BottleneckBlock3dMeta for BottleneckBlock3dConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn groups(&self) -> usize {
        self.groups
    }

    fn dilation(&self) -> usize {
        self.dilation
    }

    /// ``floor(planes * base_width / 64) * groups``
    fn width(&self) -> usize {
        self.planes * self.base_width / 64 * self.groups
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BottleneckBlock3dConfig {
    /// Check the config.
    ///
    /// Bottleneck blocks accept any groups / base width / dilation;
    /// only a degenerate (zero) inner width is rejected.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        if self.width() == 0 {
            anyhow::bail!(
                "BottleneckBlock3d inner width is 0: planes={}, base_width={}, groups={}",
                self.planes,
                self.base_width,
                self.groups
            );
        }
        Ok(())
    }

    /// Initialize a [`BottleneckBlock3d`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BottleneckBlock3d<B> {
        match self.try_init(device) {
            Ok(block) => block,
            Err(err) => panic!("{err}"),
        }
    }

    /// Initialize a [`BottleneckBlock3d`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> anyhow::Result<BottleneckBlock3d<B>> {
        self.try_validate()?;

        let width = self.width();

        let cna_builder = AbstractCNA3dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let cna1 = cna_builder.build_config(
            conv1x1x1(self.in_planes, width, 1).with_initializer(self.initializer.clone()),
        );
        let cna2 = cna_builder.build_config(
            conv3x3x3(width, width, self.stride, self.groups, self.dilation)
                .with_initializer(self.initializer.clone()),
        );
        let cna3 = cna_builder.build_config(
            conv1x1x1(width, self.out_planes(), 1).with_initializer(self.initializer.clone()),
        );

        Ok(BottleneckBlock3d {
            downsample: self.downsample.as_ref().map(|cfg| cfg.init(device)),
            cna1: cna1.init(device),
            cna2: cna2.init(device),
            cna3: cna3.init(device),
        })
    }
}

/// Bottleneck Block for `ResNet3d`.
///
/// Implements [`BottleneckBlock3dMeta`].
#[derive(Module, Debug)]
pub struct BottleneckBlock3d<B: Backend> {
    /// Optional `Downsample3d` layer; for the residual connection.
    pub downsample: Option<Downsample3d<B>>,

    /// First conv/norm/act; ``1x1x1``, reduces to `width`.
    pub cna1: CNA3d<B>,

    /// Second conv/norm/act; ``3x3x3``, strided / grouped / dilated.
    pub cna2: CNA3d<B>,

    /// Third conv/norm/act; ``1x1x1``, expands to `out_planes`.
    ///
    /// The residual is added between the norm and the act.
    pub cna3: CNA3d<B>,
}

impl<B: Backend> BottleneckBlock3dMeta for BottleneckBlock3d<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn planes(&self) -> usize {
        self.cna3.out_channels() / self.expansion()
    }

    fn groups(&self) -> usize {
        self.cna2.groups()
    }

    fn dilation(&self) -> usize {
        self.cna2.conv.dilation[0]
    }

    fn width(&self) -> usize {
        self.cna1.out_channels()
    }

    fn out_planes(&self) -> usize {
        self.cna3.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna2.stride()[0]
    }
}

impl<B: Backend> BottleneckBlock3d<B> {
    /// Forward Pass.
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
        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.cna1.forward(input);
        let x = self.cna2.forward(x);
        self.cna3.hook_forward(x, |x| x + identity)
    }

    /// Zero the last norm weight, so the block starts as an identity map.
    pub fn zero_init_residual(self) -> Self {
        let cna3 = CNA3d {
            norm: self.cna3.norm.with_constant_weight(0.0),
            ..self.cna3
        };
        Self { cna3, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    #[test]
    fn test_bottleneck_config() {
        let config = BottleneckBlock3dConfig::new(16, 8);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.planes(), 8);
        assert_eq!(config.width(), 8);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.expansion(), 4);
        assert_eq!(config.stride(), 1);

        let config = config.with_groups(2).with_base_width(128).with_stride(2);
        assert_eq!(config.width(), 32);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.output_resolution([5, 8, 8]), [3, 4, 4]);
        assert!(config.try_validate().is_ok());

        assert!(
            BottleneckBlock3dConfig::new(16, 1)
                .with_base_width(32)
                .try_validate()
                .is_err()
        );
        assert_eq!(
            BottleneckBlock3dConfig::new(16, 8)
                .with_base_width(32)
                .width(),
            4
        );
    }

    #[test]
    fn test_bottleneck_meta() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BottleneckBlock3d<B> = BottleneckBlock3dConfig::new(16, 4)
            .with_groups(2)
            .with_base_width(128)
            .with_dilation(2)
            .init(&device);

        assert_eq!(block.in_planes(), 16);
        assert_eq!(block.planes(), 4);
        assert_eq!(block.groups(), 2);
        assert_eq!(block.dilation(), 2);
        assert_eq!(block.width(), 16);
        assert_eq!(block.out_planes(), 16);
        assert_eq!(block.stride(), 1);
    }

    #[test]
    fn test_bottleneck_meta_floored_width() {
        type B = NdArray<f32>;
        let device = Default::default();

        // 3 * 40 / 64 floors to 1; the built block reports the same width.
        let config = BottleneckBlock3dConfig::new(8, 3)
            .with_groups(2)
            .with_base_width(40);
        assert_eq!(config.width(), 2);

        let block: BottleneckBlock3d<B> = config.clone().init(&device);
        assert_eq!(block.width(), config.width());
        assert_eq!(block.cna2.conv.weight.dims(), [2, 1, 3, 3, 3]);
        assert_eq!(block.planes(), 3);
        assert_eq!(block.groups(), 2);
    }

    #[test]
    fn test_bottleneck_forward_autodiff() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: BottleneckBlock3d<B> = BottleneckBlock3dConfig::new(16, 4).init(&device);

        let input = Tensor::random([2, 16, 2, 5, 5], Distribution::Default, &device);
        let output = block.forward(input);
        assert_eq!(output.dims(), [2, 16, 2, 5, 5]);
    }

    #[test]
    fn test_bottleneck_forward_downsample_dilated() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BottleneckBlock3d<B> = BottleneckBlock3dConfig::new(8, 4)
            .with_stride(2)
            .with_dilation(2)
            .with_downsample(Some(Downsample3dConfig::new(8, 16).with_stride(2)))
            .init(&device);

        let input = Tensor::random([1, 8, 3, 8, 7], Distribution::Default, &device);
        let output = block.forward(input);
        assert_eq!(output.dims(), [1, 16, 2, 4, 4]);
    }

    #[test]
    fn test_zero_init_residual_is_identity() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BottleneckBlock3d<B> = BottleneckBlock3dConfig::new(16, 4)
            .init(&device)
            .zero_init_residual();

        block
            .cna3
            .norm
            .weight()
            .unwrap()
            .to_data()
            .assert_eq(&Tensor::<B, 1>::zeros([16], &device).to_data(), true);

        let input: Tensor<B, 5> =
            Tensor::random([1, 16, 2, 3, 3], Distribution::Uniform(0.0, 1.0), &device);
        let output = block.forward(input.clone());
        output.to_data().assert_eq(&input.to_data(), true);
    }
}
