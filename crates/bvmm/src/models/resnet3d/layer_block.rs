//! # `ResNet3d` Layer Block
//!
//! A [`LayerBlock3d`] is a sequence of [`ResidualBlock3d`]s; one network stage.
//!
//! [`LayerBlock3dMeta`] defines a common meta API for [`LayerBlock3d`]
//! and [`LayerBlock3dConfig`].

use crate::models::resnet3d::residual_block::{
    ResidualBlock3d, ResidualBlock3dConfig, ResidualBlock3dMeta,
};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`LayerBlock3d`] Meta API.
pub trait LayerBlock3dMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the layers.
    fn stride(&self) -> usize;

    /// Get the ``[depth, height, width]`` output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> [usize; 3];
}

/// [`LayerBlock3d`] Configuration.
#[derive(Config, Debug)]
pub struct LayerBlock3dConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlock3dConfig>,
}

impl From<Vec<ResidualBlock3dConfig>> for LayerBlock3dConfig {
    fn from(blocks: Vec<ResidualBlock3dConfig>) -> Self {
        Self { blocks }
    }
}

impl LayerBlock3dMeta for LayerBlock3dConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> [usize; 3] {
        self.blocks
            .iter()
            .fold(input_resolution, |res, block| block.output_resolution(res))
    }
}

impl LayerBlock3dConfig {
    /// Check if the config is valid.
    ///
    /// The stage must be non-empty, each block must be valid, and each
    /// block's input planes must match the previous block's output planes.
    pub fn try_validate(&self) -> anyhow::Result<()> {
        if self.is_empty() {
            anyhow::bail!("blocks is empty");
        }

        for (idx, block) in self.blocks.iter().enumerate() {
            block
                .try_validate()
                .map_err(|err| err.context(format!("block[{idx}]")))?;
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                anyhow::bail!(
                    "block[{}].out_planes({}) != block[{}].in_planes({})",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                );
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{err:#}");
        }
    }

    /// Initialize a new [`LayerBlock3d`].
    pub fn try_init<B: Backend>(
        self,
        device: &B::Device,
    ) -> anyhow::Result<LayerBlock3d<B>> {
        self.try_validate()?;

        Ok(LayerBlock3d {
            blocks: self
                .blocks
                .iter()
                .map(|block| block.try_init(device))
                .collect::<anyhow::Result<Vec<_>>>()?,
        })
    }

    /// Initialize a new [`LayerBlock3d`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> LayerBlock3d<B> {
        self.expect_valid();
        match self.try_init(device) {
            Ok(layer) => layer,
            Err(err) => panic!("{err:#}"),
        }
    }
}

/// A sequence of [`ResidualBlock3d`]s.
#[derive(Module, Debug)]
pub struct LayerBlock3d<B: Backend> {
    /// The component blocks.
    pub blocks: Vec<ResidualBlock3d<B>>,
}

impl<B: Backend> LayerBlock3dMeta for LayerBlock3d<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 3],
    ) -> [usize; 3] {
        self.blocks
            .iter()
            .fold(input_resolution, |res, block| block.output_resolution(res))
    }
}

impl<B: Backend> LayerBlock3d<B> {
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
        self.blocks
            .iter()
            .fold(input, |x, block| block.forward(x))
    }

    /// Zero the last norm weight of every block.
    pub fn zero_init_residual(self) -> Self {
        Self {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.zero_init_residual())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet3d::downsample::Downsample3dConfig;
    use crate::models::resnet3d::residual_block::ResidualBlockKind;
    use burn::backend::NdArray;

    fn stage(kind: &ResidualBlockKind) -> LayerBlock3dConfig {
        let out = 8 * kind.expansion();
        vec![
            kind.block_config(4, 8)
                .with_stride(2)
                .with_downsample(Some(Downsample3dConfig::new(4, out).with_stride(2))),
            kind.block_config(out, 8),
        ]
        .into()
    }

    #[test]
    fn test_layer_block_config() {
        let config = stage(&ResidualBlockKind::Bottleneck);
        assert_eq!(config.len(), 2);
        assert_eq!(config.in_planes(), 4);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([3, 8, 8]), [2, 4, 4]);
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_layer_block_validation() {
        let config = LayerBlock3dConfig::new(vec![]);
        assert_eq!(
            config.try_validate().unwrap_err().to_string(),
            "blocks is empty"
        );

        let config: LayerBlock3dConfig = vec![
            ResidualBlockKind::Basic.block_config(4, 8),
            ResidualBlockKind::Basic.block_config(4, 8),
        ]
        .into();
        assert_eq!(
            config.try_validate().unwrap_err().to_string(),
            "block[0].out_planes(8) != block[1].in_planes(4)"
        );

        let config: LayerBlock3dConfig =
            vec![ResidualBlockKind::Basic.block_config(4, 4).with_groups(2)].into();
        let err = config.try_validate().unwrap_err();
        assert_eq!(err.to_string(), "block[0]");
        assert!(format!("{err:#}").contains("only supports groups=1 and base_width=64"));
    }

    #[test]
    #[should_panic(expected = "blocks is empty")]
    fn test_layer_block_init_panics() {
        let _layer: LayerBlock3d<NdArray<f32>> =
            LayerBlock3dConfig::new(vec![]).init(&Default::default());
    }

    #[test]
    fn test_layer_block_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        for kind in [ResidualBlockKind::Basic, ResidualBlockKind::Bottleneck] {
            let layer: LayerBlock3d<B> = stage(&kind).init(&device);
            assert_eq!(layer.len(), 2);
            assert_eq!(layer.stride(), 2);
            assert!(layer.blocks[0].has_downsample());
            assert!(!layer.blocks[1].has_downsample());

            let output = layer.forward(Tensor::ones([1, 4, 3, 8, 7], &device));
            assert_eq!(output.dims(), [1, 8 * kind.expansion(), 2, 4, 4]);
        }
    }
}
