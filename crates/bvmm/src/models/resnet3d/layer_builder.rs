//! # Stage Assembly
//!
//! [`LayerBuilder3d`] carries the running channel width and running dilation
//! across the stages of a network, and emits one [`LayerBlock3dConfig`] per call
//! to [`LayerBuilder3d::make_layer`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::models::resnet3d::downsample::Downsample3dConfig;
use crate::models::resnet3d::layer_block::LayerBlock3dConfig;
use crate::models::resnet3d::residual_block::ResidualBlockKind;
use burn::nn::Initializer;

/// Running state for assembling the stages of a network.
#[derive(Debug, Clone)]
pub struct LayerBuilder3d {
    /// The block variant.
    pub block: ResidualBlockKind,

    /// The running channel width; the input planes of the next stage.
    pub inplanes: usize,

    /// The running dilation.
    pub dilation: usize,

    /// Conv groups of every block.
    pub groups: usize,

    /// Base width of every block.
    pub base_width: usize,

    /// Normalization of every block.
    pub normalization: NormalizationConfig,

    /// Activation of every block.
    pub activation: ActivationConfig,

    /// Conv initializer of every block.
    pub initializer: Initializer,
}

impl LayerBuilder3d {
    /// Create a builder.
    ///
    /// # Arguments
    ///
    /// - `block`: the block variant.
    /// - `inplanes`: the channel width of the stem output.
    pub fn new(
        block: ResidualBlockKind,
        inplanes: usize,
    ) -> Self {
        let activation = ActivationConfig::Relu;
        Self {
            block,
            inplanes,
            dilation: 1,
            groups: 1,
            base_width: 64,
            normalization: NormalizationConfig::default(),
            initializer: crate::models::resnet3d::util::conv_initializer(&activation),
            activation,
        }
    }

    /// Set the conv groups.
    pub fn with_groups(
        self,
        groups: usize,
    ) -> Self {
        Self { groups, ..self }
    }

    /// Set the base width.
    pub fn with_base_width(
        self,
        base_width: usize,
    ) -> Self {
        Self { base_width, ..self }
    }

    /// Set the normalization.
    pub fn with_normalization(
        self,
        normalization: NormalizationConfig,
    ) -> Self {
        Self {
            normalization,
            ..self
        }
    }

    /// Set the activation.
    pub fn with_activation(
        self,
        activation: ActivationConfig,
    ) -> Self {
        Self { activation, ..self }
    }

    /// Set the conv initializer.
    pub fn with_initializer(
        self,
        initializer: Initializer,
    ) -> Self {
        Self {
            initializer,
            ..self
        }
    }

    /// Build the config for one stage, and advance the running state.
    ///
    /// * When `dilate` is set, the stride is traded for dilation:
    ///   the running dilation is multiplied by `stride`, and the stage stride becomes 1.
    /// * The first block gets a [`Downsample3dConfig`] iff the stride is not 1,
    ///   or the running width differs from ``planes * expansion``.
    /// * The first block uses the dilation in effect *before* this stage;
    ///   the remaining blocks use the updated running dilation.
    ///
    /// # Arguments
    ///
    /// - `planes`: the stage's plane count; outputs ``planes * expansion`` channels.
    /// - `blocks`: the number of blocks.
    /// - `stride`: the stride of the first block.
    /// - `dilate`: replace the stride with dilation.
    pub fn make_layer(
        &mut self,
        planes: usize,
        blocks: usize,
        stride: usize,
        dilate: bool,
    ) -> anyhow::Result<LayerBlock3dConfig> {
        if blocks == 0 {
            anyhow::bail!("a stage needs at least one block: planes={planes}");
        }

        let previous_dilation = self.dilation;
        let mut stride = stride;
        if dilate {
            self.dilation *= stride;
            stride = 1;
        }

        let out_planes = planes * self.block.expansion();

        let downsample = if stride != 1 || self.inplanes != out_planes {
            Some(
                Downsample3dConfig::new(self.inplanes, out_planes)
                    .with_stride(stride)
                    .with_normalization(self.normalization.clone())
                    .with_initializer(self.initializer.clone()),
            )
        } else {
            None
        };

        let mut configs = Vec::with_capacity(blocks);
        configs.push(
            self.block_config(self.inplanes, planes, previous_dilation)
                .with_stride(stride)
                .with_downsample(downsample),
        );

        self.inplanes = out_planes;

        for _ in 1..blocks {
            configs.push(self.block_config(self.inplanes, planes, self.dilation));
        }

        let layer: LayerBlock3dConfig = configs.into();
        layer.try_validate()?;

        tracing::debug!(
            planes,
            blocks,
            stride,
            dilation = self.dilation,
            out_planes,
            "assembled resnet3d stage"
        );

        Ok(layer)
    }

    fn block_config(
        &self,
        in_planes: usize,
        planes: usize,
        dilation: usize,
    ) -> crate::models::resnet3d::residual_block::ResidualBlock3dConfig {
        self.block
            .block_config(in_planes, planes)
            .with_groups(self.groups)
            .with_base_width(self.base_width)
            .with_dilation(dilation)
            .with_normalization(self.normalization.clone())
            .with_activation(self.activation.clone())
            .with_initializer(self.initializer.clone())
    }
}
