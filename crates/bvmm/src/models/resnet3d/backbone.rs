//! # `ResNet3d` Backbone
//!
//! [`ResNet3dBackbone`] runs the stem and the four stages of a [`ResNet3d`],
//! and returns every intermediate feature map; for encoder/decoder
//! (segmentation) networks.
//!
//! | output | channels         | source        |
//! |--------|------------------|---------------|
//! | `x1`   | ``32`` / ``128`` | stem          |
//! | `x2`   | ``64 * e``       | stage 1       |
//! | `x3`   | ``128 * e``      | stage 2       |
//! | `x4`   | ``256 * e``      | stage 3       |
//! | `x5`   | ``512 * e``      | stage 4       |
//!
//! Where ``e`` is the block expansion; 1 for basic, 4 for bottleneck.

use crate::models::resnet3d::layer_block::{LayerBlock3d, LayerBlock3dMeta};
use crate::models::resnet3d::prefabs::resnet3d_from_prefab;
use crate::models::resnet3d::resnet_model::{ResNet3d, ResNet3dConfig};
use crate::models::resnet3d::stem::{Stem3d, Stem3dMeta};
use burn::prelude::{Backend, Module, Tensor};

/// Multi-scale feature extractor over a [`ResNet3d`].
///
/// The classifier head is discarded.
#[derive(Module, Debug)]
pub struct ResNet3dBackbone<B: Backend> {
    /// Input stem.
    pub stem: Stem3d<B>,

    /// Stage 1.
    pub layer1: LayerBlock3d<B>,

    /// Stage 2.
    pub layer2: LayerBlock3d<B>,

    /// Stage 3.
    pub layer3: LayerBlock3d<B>,

    /// Stage 4.
    pub layer4: LayerBlock3d<B>,
}

impl<B: Backend> From<ResNet3d<B>> for ResNet3dBackbone<B> {
    fn from(model: ResNet3d<B>) -> Self {
        Self {
            stem: model.stem,
            layer1: model.layer1,
            layer2: model.layer2,
            layer3: model.layer3,
            layer4: model.layer4,
        }
    }
}

impl<B: Backend> ResNet3dBackbone<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    /// Channels of the five feature maps.
    pub fn feature_channels(&self) -> [usize; 5] {
        [
            self.stem.out_channels(),
            self.layer1.out_planes(),
            self.layer2.out_planes(),
            self.layer3.out_planes(),
            self.layer4.out_planes(),
        ]
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, depth, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[x1, x2, x3, x4, x5]``; post-stem, then post-stage 1 through 4.
    pub fn forward(
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
}

/// Build a [`ResNet3dBackbone`] from a network config.
pub fn build_backbone<B: Backend>(
    config: &ResNet3dConfig,
    device: &B::Device,
) -> anyhow::Result<ResNet3dBackbone<B>> {
    Ok(config.try_init(device)?.into())
}

/// Build a [`ResNet3dBackbone`] from a named depth.
///
/// See [`resnet3d_from_prefab`].
pub fn build_backbone_from_prefab<B, F>(
    name: &str,
    pretrained: bool,
    configure: F,
    device: &B::Device,
) -> anyhow::Result<ResNet3dBackbone<B>>
where
    B: Backend,
    F: FnOnce(ResNet3dConfig) -> ResNet3dConfig,
{
    Ok(resnet3d_from_prefab(name, pretrained, configure, device)?.into())
}
