//! # `ResNet3d` Core Model
//!
//! [`ResNet3d`] is the full network:
//! stem -> four stages -> global average pool -> classifier head.
//!
//! [`ResNet3dConfig`] implements [`Config`], and provides
//! [`ResNet3dConfig::try_init`] to initialize a [`ResNet3d`].
//!
//! Initialization policy:
//! * every conv weight is Kaiming-normal, fan-out, with the gain of the configured activation;
//! * every norm weight is 1 and bias is 0 (the ``burn`` defaults);
//! * with `zero_init_residual`, the last norm weight of every residual block is 0.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::pool::{AdaptiveAvgPool3d, AdaptiveAvgPool3dConfig};
use crate::models::resnet3d::head::{ClassifierHead3d, ClassifierHead3dConfig};
use crate::models::resnet3d::layer_block::{LayerBlock3d, LayerBlock3dConfig, LayerBlock3dMeta};
use crate::models::resnet3d::layer_builder::LayerBuilder3d;
use crate::models::resnet3d::residual_block::ResidualBlockKind;
use crate::models::resnet3d::stem::{Stem3d, Stem3dConfig, Stem3dMeta};
use crate::models::resnet3d::util::conv_initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Planes of the four stages.
pub const STAGE_PLANES: [usize; 4] = [64, 128, 256, 512];

/// [`ResNet3d`] Meta API.
pub trait ResNet3dMeta {
    /// Input channels.
    fn in_channels(&self) -> usize;

    /// Number of output classes.
    fn num_classes(&self) -> usize;

    /// Channels of the five feature maps: stem, then stages 1 through 4.
    fn feature_channels(&self) -> [usize; 5];
}

/// [`ResNet3d`] Config.
///
/// Implements [`ResNet3dMeta`].
#[derive(Config, Debug)]
pub struct ResNet3dConfig {
    /// The residual block variant.
    pub block: ResidualBlockKind,

    /// Blocks per stage.
    pub layers: [usize; 4],

    /// Input channels.
    #[config(default = 3)]
    pub in_channels: usize,

    /// Number of output classes.
    #[config(default = 101)]
    pub num_classes: usize,

    /// Zero the last norm weight of every residual block.
    #[config(default = false)]
    pub zero_init_residual: bool,

    /// Conv groups of the residual blocks.
    #[config(default = 1)]
    pub groups: usize,

    /// Base width of the residual blocks.
    #[config(default = 64)]
    pub width_per_group: usize,

    /// Replace the stride of stages 2, 3 and 4 with dilation.
    ///
    /// Must have exactly 3 entries when present.
    #[config(default = "None")]
    pub replace_stride_with_dilation: Option<Vec<bool>>,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    ///
    /// The feature size is matched per layer.
    #[config(default = "NormalizationConfig::default()")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,

    /// Apply a softmax over the class dimension of the output.
    #[config(default = false)]
    pub final_softmax: bool,

    /// Head dropout probability.
    #[config(default = 0.5)]
    pub ps: f64,
}

impl ResNet3dMeta for ResNet3dConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn feature_channels(&self) -> [usize; 5] {
        let e = self.block.expansion();
        [
            self.block.stem_width(),
            STAGE_PLANES[0] * e,
            STAGE_PLANES[1] * e,
            STAGE_PLANES[2] * e,
            STAGE_PLANES[3] * e,
        ]
    }
}

impl ResNet3dConfig {
    /// The per-stage dilation substitution flags.
    ///
    /// Returns an error unless there are exactly 3 flags.
    pub fn dilation_flags(&self) -> anyhow::Result<[bool; 3]> {
        match &self.replace_stride_with_dilation {
            None => Ok([false; 3]),
            Some(flags) => match flags.as_slice() {
                [a, b, c] => Ok([*a, *b, *c]),
                _ => anyhow::bail!(
                    "replace_stride_with_dilation should be None or a 3-element list, got {:?}",
                    flags
                ),
            },
        }
    }

    /// Check the config.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        self.dilation_flags()?;
        if self.in_channels == 0 {
            anyhow::bail!("in_channels must be > 0");
        }
        if self.num_classes == 0 {
            anyhow::bail!("num_classes must be > 0");
        }
        self.head_config().try_validate()?;
        self.try_layer_configs()?;
        Ok(())
    }

    /// The stem config.
    pub fn stem_config(&self) -> Stem3dConfig {
        Stem3dConfig::new(self.in_channels, self.block.stem_width())
            .with_normalization(self.normalization.clone())
            .with_activation(self.activation.clone())
            .with_initializer(conv_initializer(&self.activation))
    }

    /// Assemble the four stage configs.
    pub fn try_layer_configs(&self) -> anyhow::Result<[LayerBlock3dConfig; 4]> {
        let dilate = self.dilation_flags()?;

        let mut builder = LayerBuilder3d::new(self.block.clone(), self.block.stem_width())
            .with_groups(self.groups)
            .with_base_width(self.width_per_group)
            .with_normalization(self.normalization.clone())
            .with_activation(self.activation.clone())
            .with_initializer(conv_initializer(&self.activation));

        Ok([
            builder.make_layer(STAGE_PLANES[0], self.layers[0], 1, false)?,
            builder.make_layer(STAGE_PLANES[1], self.layers[1], 2, dilate[0])?,
            builder.make_layer(STAGE_PLANES[2], self.layers[2], 2, dilate[1])?,
            builder.make_layer(STAGE_PLANES[3], self.layers[3], 2, dilate[2])?,
        ])
    }

    /// The classifier head config.
    pub fn head_config(&self) -> ClassifierHead3dConfig {
        ClassifierHead3dConfig::new(
            STAGE_PLANES[3] * self.block.expansion(),
            self.num_classes,
        )
        .with_ps(self.ps)
        .with_activation(self.activation.clone())
        .with_final_softmax(self.final_softmax)
    }

    /// Initialize a [`ResNet3d`].
    pub fn try_init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> anyhow::Result<ResNet3d<B>> {
        let dilate = self.dilation_flags()?;
        let [layer1, layer2, layer3, layer4] = self.try_layer_configs()?;

        tracing::debug!(
            block = ?self.block,
            layers = ?self.layers,
            in_channels = self.in_channels,
            num_classes = self.num_classes,
            dilate = ?dilate,
            "building resnet3d"
        );

        let model = ResNet3d {
            stem: self.stem_config().init(device),
            layer1: layer1.try_init(device)?,
            layer2: layer2.try_init(device)?,
            layer3: layer3.try_init(device)?,
            layer4: layer4.try_init(device)?,
            avgpool: AdaptiveAvgPool3dConfig::new().init(),
            fc: self.head_config().try_init(device)?,
        };

        Ok(if self.zero_init_residual {
            model.with_zero_init_residual()
        } else {
            model
        })
    }

    /// Initialize a [`ResNet3d`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNet3d<B> {
        match self.try_init(device) {
            Ok(model) => model,
            Err(err) => panic!("{err:#}"),
        }
    }
}

/// 3D `ResNet` for video / volumetric classification.
///
/// Implements [`ResNet3dMeta`].
#[derive(Module, Debug)]
pub struct ResNet3d<B: Backend> {
    /// Input stem.
    pub stem: Stem3d<B>,

    /// Stage 1; 64 planes, stride 1.
    pub layer1: LayerBlock3d<B>,

    /// Stage 2; 128 planes, stride 2.
    pub layer2: LayerBlock3d<B>,

    /// Stage 3; 256 planes, stride 2.
    pub layer3: LayerBlock3d<B>,

    /// Stage 4; 512 planes, stride 2.
    pub layer4: LayerBlock3d<B>,

    /// Global average pool.
    pub avgpool: AdaptiveAvgPool3d,

    /// Classifier head.
    pub fc: ClassifierHead3d<B>,
}

impl<B: Backend> ResNet3dMeta for ResNet3d<B> {
    fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    fn num_classes(&self) -> usize {
        self.fc.num_classes()
    }

    fn feature_channels(&self) -> [usize; 5] {
        [
            self.stem.out_channels(),
            self.layer1.out_planes(),
            self.layer2.out_planes(),
            self.layer3.out_planes(),
            self.layer4.out_planes(),
        ]
    }
}

impl<B: Backend> ResNet3d<B> {
    /// The four stages, in order.
    pub fn stages(&self) -> [&LayerBlock3d<B>; 4] {
        [&self.layer1, &self.layer2, &self.layer3, &self.layer4]
    }

    /// Every conv weight, by module path; in forward order.
    pub fn named_conv_weights(&self) -> Vec<(String, Tensor<B, 5>)> {
        let mut weights = vec![("stem.cna.conv".to_string(), self.stem.cna.conv.weight.val())];
        for (stage_idx, stage) in self.stages().into_iter().enumerate() {
            for (block_idx, block) in stage.blocks.iter().enumerate() {
                for (name, conv) in block.named_convs() {
                    weights.push((
                        format!("layer{}.blocks.{block_idx}.{name}", stage_idx + 1),
                        conv.weight.val(),
                    ));
                }
            }
        }
        weights
    }

    /// Zero the last norm weight of every residual block.
    pub fn with_zero_init_residual(self) -> Self {
        Self {
            layer1: self.layer1.zero_init_residual(),
            layer2: self.layer2.zero_init_residual(),
            layer3: self.layer3.zero_init_residual(),
            layer4: self.layer4.zero_init_residual(),
            ..self
        }
    }

    /// Run the stem and the four stages.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// The five feature maps; post-stem, then post-stage 1 through 4.
    pub fn forward_features(
        &self,
        input: Tensor<B, 5>,
    ) -> [Tensor<B, 5>; 5] {
        let x1 = self.stem.forward(input);
        let x2 = self.layer1.forward(x1.clone());
        let x3 = self.layer2.forward(x2.clone());
        let x4 = self.layer3.forward(x3.clone());
        let x5 = self.layer4.forward(x4.clone());
        [x1, x2, x3, x4, x5]
    }

    /// Pool and classify the final feature map.
    ///
    /// # Arguments
    ///
    /// - `features`: ``[batch, 512 * expansion, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``
    pub fn forward_head(
        &self,
        features: Tensor<B, 5>,
    ) -> Tensor<B, 2> {
        let x = self.avgpool.forward(features);
        let x: Tensor<B, 2> = x.flatten(1, 4);
        self.fc.forward(x)
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]``
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
    ) -> Tensor<B, 2> {
        let x = self.stem.forward(input);
        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        let x = self.layer3.forward(x);
        let x = self.layer4.forward(x);
        self.forward_head(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet3d::residual_block::ResidualBlock3d;
    use burn::backend::NdArray;
    use burn::nn::GroupNormConfig;
    use burn::tensor::Distribution;

    #[test]
    fn test_config_validation() {
        let config = ResNet3dConfig::new(ResidualBlockKind::Basic, [1, 1, 1, 1]);
        assert!(config.try_validate().is_ok());
        assert_eq!(config.dilation_flags().unwrap(), [false; 3]);

        let config = config.with_replace_stride_with_dilation(Some(vec![false, true]));
        let err = config.try_validate().unwrap_err();
        assert!(err.to_string().contains("3-element list"));

        let config = ResNet3dConfig::new(ResidualBlockKind::Bottleneck, [1, 1, 1, 1])
            .with_replace_stride_with_dilation(Some(vec![false, true, true]));
        assert_eq!(config.dilation_flags().unwrap(), [false, true, true]);
        assert!(config.try_validate().is_ok());

        // Basic blocks reject dilation.
        let config = ResNet3dConfig::new(ResidualBlockKind::Basic, [1, 2, 1, 1])
            .with_replace_stride_with_dilation(Some(vec![true, false, false]));
        let err = config.try_validate().unwrap_err();
        assert!(format!("{err:#}").contains("dilation > 1 not supported"));

        let config =
            ResNet3dConfig::new(ResidualBlockKind::Basic, [1, 1, 1, 1]).with_width_per_group(32);
        assert!(config.try_validate().is_err());
    }

    #[test]
    #[should_panic(expected = "replace_stride_with_dilation should be None or a 3-element list")]
    fn test_init_panics() {
        let _model: ResNet3d<NdArray<f32>> =
            ResNet3dConfig::new(ResidualBlockKind::Basic, [1, 1, 1, 1])
                .with_replace_stride_with_dilation(Some(vec![true; 4]))
                .init(&Default::default());
    }

    #[test]
    fn test_feature_channels() {
        let config = ResNet3dConfig::new(ResidualBlockKind::Basic, [2, 2, 2, 2]);
        assert_eq!(config.feature_channels(), [32, 64, 128, 256, 512]);

        let config = ResNet3dConfig::new(ResidualBlockKind::Bottleneck, [3, 4, 6, 3]);
        assert_eq!(config.feature_channels(), [128, 256, 512, 1024, 2048]);
    }

    #[test]
    fn test_downsample_placement() {
        let config = ResNet3dConfig::new(ResidualBlockKind::Basic, [2, 2, 2, 2]);
        let stages = config.try_layer_configs().unwrap();

        // Basic: stem 32 != 64, so stage 1 projects even at stride 1.
        for stage in stages.iter() {
            assert!(stage.blocks[0].downsample().is_some());
            for block in &stage.blocks[1..] {
                assert!(block.downsample().is_none());
            }
        }
        assert_eq!(stages[0].blocks[0].downsample().unwrap().stride, 1);
        assert_eq!(stages[1].blocks[0].downsample().unwrap().stride, 2);

        let config = ResNet3dConfig::new(ResidualBlockKind::Bottleneck, [2, 2, 2, 2])
            .with_replace_stride_with_dilation(Some(vec![false, false, true]));
        let stages = config.try_layer_configs().unwrap();
        assert_eq!(stages[0].in_planes(), 128);
        assert_eq!(stages[0].out_planes(), 256);
        assert_eq!(stages[3].stride(), 1);
        assert_eq!(stages[3].blocks[0].downsample().unwrap().stride, 1);
        assert_eq!(stages[3].blocks[1].dilation(), 2);
    }

    #[test]
    fn test_basic_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet3d<B> = ResNet3dConfig::new(ResidualBlockKind::Basic, [1, 1, 1, 1])
            .with_num_classes(5)
            .init(&device);
        assert_eq!(model.in_channels(), 3);
        assert_eq!(model.num_classes(), 5);
        assert_eq!(model.feature_channels(), [32, 64, 128, 256, 512]);

        let input = Tensor::random([2, 3, 3, 24, 24], Distribution::Default, &device);
        let output = model.forward(input.clone());
        assert_eq!(output.dims(), [2, 5]);

        let [x1, x2, x3, x4, x5] = model.forward_features(input);
        assert_eq!(x1.dims(), [2, 32, 4, 8, 8]);
        assert_eq!(x2.dims(), [2, 64, 4, 8, 8]);
        assert_eq!(x3.dims(), [2, 128, 2, 4, 4]);
        assert_eq!(x4.dims(), [2, 256, 1, 2, 2]);
        assert_eq!(x5.dims(), [2, 512, 1, 1, 1]);
    }

    #[test]
    fn test_bottleneck_forward_softmax_group_norm() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet3d<B> = ResNet3dConfig::new(ResidualBlockKind::Bottleneck, [1, 1, 1, 1])
            .with_in_channels(1)
            .with_num_classes(4)
            .with_groups(2)
            .with_width_per_group(32)
            .with_normalization(GroupNormConfig::new(8, 0).into())
            .with_final_softmax(true)
            .init(&device);

        let input = Tensor::random([1, 1, 2, 12, 12], Distribution::Default, &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [1, 4]);

        let total: f32 = output.sum().into_scalar();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_init_residual() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet3d<B> = ResNet3dConfig::new(ResidualBlockKind::Basic, [2, 1, 1, 1])
            .with_zero_init_residual(true)
            .init(&device);

        for stage in model.stages() {
            for block in &stage.blocks {
                let gamma = block.last_norm().weight().unwrap();
                let max: f32 = gamma.abs().max().into_scalar();
                assert_eq!(max, 0.0);

                // Earlier norms keep the unit default.
                if let ResidualBlock3d::Basic(basic) = block {
                    let min: f32 = basic.cna1.norm.weight().unwrap().min().into_scalar();
                    assert_eq!(min, 1.0);
                }
            }
        }

        // Stage 1, block 2: 64 -> 64, stride 1; the block is the identity on non-negative inputs.
        let block = &model.layer1.blocks[1];
        let input: Tensor<B, 5> =
            Tensor::random([1, 64, 2, 3, 3], Distribution::Uniform(0.0, 1.0), &device);
        block
            .forward(input.clone())
            .to_data()
            .assert_eq(&input.to_data(), true);
    }

    #[test]
    fn test_named_conv_weights() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet3d<B> =
            ResNet3dConfig::new(ResidualBlockKind::Basic, [2, 1, 1, 1]).init(&device);
        let weights = model.named_conv_weights();

        // stem + 5 blocks * 2 convs + 4 downsamples.
        assert_eq!(weights.len(), 1 + 10 + 4);
        assert_eq!(weights[0].0, "stem.cna.conv");
        assert_eq!(weights[0].1.dims(), [32, 3, 2, 5, 5]);
        assert_eq!(weights[1].0, "layer1.blocks.0.cna1.conv");
        assert_eq!(weights[3].0, "layer1.blocks.0.downsample.conv_norm.conv");
        assert_eq!(weights[4].0, "layer1.blocks.1.cna1.conv");
        assert_eq!(weights[14].1.dims(), [512, 256, 1, 1, 1]);
    }
}
