//! # Basic Block for `ResNet3d`
//!
//! [`BasicBlock3d`] is the two-conv residual unit used by the shallow
//! (18/34) variants.
//!
//! [`BasicBlock3dMeta`] defines a common meta API for [`BasicBlock3d`]
//! and [`BasicBlock3dConfig`].
//!
//! [`BasicBlock3dConfig`] implements [`Config`], and provides
//! [`BasicBlock3dConfig::try_init`] to initialize a [`BasicBlock3d`].
//!
//! [`BasicBlock3d`] implements [`Module`], and provides
//! [`BasicBlock3d::forward`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA3dConfig, CNA3d, CNA3dMeta};
use crate::models::resnet3d::downsample::{Downsample3d, Downsample3dConfig};
use crate::models::resnet3d::util::{conv_initializer, conv3x3x3, stride_output_resolution};
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`BasicBlock3d`] Meta trait.
pub trait BasicBlock3dMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// Configures the size of `out_planes`.
    fn planes(&self) -> usize;

    /// The expansion factor of the block; always 1.
    fn expansion(&self) -> usize {
        BASIC_BLOCK_EXPANSION
    }

    /// The size of the out channels dimension.
    ///
    /// ``out_planes = planes * expansion``
    fn out_planes(&self) -> usize {
        self.planes() * self.expansion()
    }

    /// The stride of the first convolution.
    fn stride(&self) -> usize;

    /// Get the ``[depth, height, width]`` output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> [usize; 3] {
        stride_output_resolution(input_resolution, self.stride())
    }
}

/// Channel expansion of [`BasicBlock3d`].
pub const BASIC_BLOCK_EXPANSION: usize = 1;

/// [`BasicBlock3d`] Config.
///
/// Implements [`BasicBlock3dMeta`].
#[derive(Config, Debug)]
pub struct BasicBlock3dConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Configures the `out_planes`.
    pub planes: usize,

    /// The stride of the first conv.
    #[config(default = 1)]
    pub stride: usize,

    /// Optional projection of the identity path.
    #[config(default = "None")]
    pub downsample: Option<Downsample3dConfig>,

    /// Conv groups; must be 1.
    #[config(default = 1)]
    pub groups: usize,

    /// Base width; must be 64.
    #[config(default = 64)]
    pub base_width: usize,

    /// Dilation; must be 1.
    #[config(default = 1)]
    pub dilation: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    ///
    /// The feature size of this config will be replaced
    /// with the appropriate feature size for the input layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,

    /// The conv initializer.
    #[config(default = "conv_initializer(&ActivationConfig::Relu)")]
    pub initializer: Initializer,
}

impl BasicBlock3dMeta for BasicBlock3dConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BasicBlock3dConfig {
    /// Check the config for unsupported options.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        if self.groups != 1 || self.base_width != 64 {
            anyhow::bail!(
                "BasicBlock3d only supports groups=1 and base_width=64: groups={}, base_width={}",
                self.groups,
                self.base_width
            );
        }
        if self.dilation > 1 {
            anyhow::bail!(
                "dilation > 1 not supported in BasicBlock3d: dilation={}",
                self.dilation
            );
        }
        Ok(())
    }

    /// Initialize a [`BasicBlock3d`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BasicBlock3d<B> {
        match self.try_init(device) {
            Ok(block) => block,
            Err(err) => panic!("{err}"),
        }
    }

    /// Initialize a [`BasicBlock3d`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> anyhow::Result<BasicBlock3d<B>> {
        self.try_validate()?;

        let cna_builder = AbstractCNA3dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let cna1 = cna_builder.build_config(
            conv3x3x3(self.in_planes, self.planes, self.stride, 1, 1)
                .with_initializer(self.initializer.clone()),
        );
        let cna2 = cna_builder.build_config(
            conv3x3x3(self.planes, self.out_planes(), 1, 1, 1)
                .with_initializer(self.initializer.clone()),
        );

        Ok(BasicBlock3d {
            downsample: self.downsample.as_ref().map(|cfg| cfg.init(device)),
            cna1: cna1.init(device),
            cna2: cna2.init(device),
        })
    }
}

/// Basic Block for `ResNet3d`.
///
/// Implements [`BasicBlock3dMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock3d<B: Backend> {
    /// Optional `Downsample3d` layer; for the residual connection.
    pub downsample: Option<Downsample3d<B>>,

    /// First Conv/Norm/Act Block.
    pub cna1: CNA3d<B>,

    /// Second Conv/Norm/Act Block.
    ///
    /// The residual is added between the norm and the act.
    pub cna2: CNA3d<B>,
}

impl<B: Backend> BasicBlock3dMeta for BasicBlock3d<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn planes(&self) -> usize {
        self.cna1.out_channels()
    }

    fn out_planes(&self) -> usize {
        self.cna2.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna1.stride()[0]
    }
}

impl<B: Backend> BasicBlock3d<B> {
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
        self.cna2.hook_forward(x, |x| x + identity)
    }

    /// Zero the last norm weight, so the block starts as an identity map.
    pub fn zero_init_residual(self) -> Self {
        let cna2 = CNA3d {
            norm: self.cna2.norm.with_constant_weight(0.0),
            ..self.cna2
        };
        Self { cna2, ..self }
    }
}
