#![allow(missing_docs)]
//! # ``torch`` ResNet3d Stubs.
//!
//! Stub modules mirroring the ``torch`` module tree of the published archives.
//! The loaded weights carry no information about stateless modules
//! (activations, dropout, pooling), so records are read into these stubs,
//! then copied onto a [`ResNet3d`] built from a config.
//!
//! Key remapping, ``torch`` -> stub:
//!
//! | ``torch``        | stub              |
//! |------------------|-------------------|
//! | ``stem.0``       | ``stem_conv``     |
//! | ``stem.1``       | ``stem_bn``       |
//! | ``downsample.0`` | ``downsample.conv`` |
//! | ``downsample.1`` | ``downsample.bn`` |
//! | ``fc.0``         | ``fc.norm1``      |
//! | ``fc.2``         | ``fc.fc1``        |
//! | ``fc.4``         | ``fc.norm2``      |
//! | ``fc.6``         | ``fc.fc2``        |
use crate::compat::normalization_wrapper::Normalization;
use crate::layers::blocks::cna::CNA3d;
use crate::layers::blocks::conv_norm::ConvNorm3d;
use crate::models::resnet3d::basic_block::BasicBlock3d;
use crate::models::resnet3d::bottleneck::BottleneckBlock3d;
use crate::models::resnet3d::downsample::Downsample3d;
use crate::models::resnet3d::head::ClassifierHead3d;
use crate::models::resnet3d::layer_block::LayerBlock3d;
use crate::models::resnet3d::residual_block::ResidualBlock3d;
use crate::models::resnet3d::resnet_model::ResNet3d;
use crate::models::resnet3d::stem::Stem3d;
use anyhow::{Context, bail};
use burn::module::Module;
use burn::nn::conv::{Conv3d, Conv3dRecord};
use burn::nn::{BatchNorm, BatchNormRecord, Linear};
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, Recorder};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::PathBuf;

/// The archive key holding the state dict.
pub const STATE_DICT_KEY: &str = "model";

/// The ``torch`` -> stub key remapping.
pub const KEY_REMAP: [(&str, &str); 8] = [
    (r"^stem\.0\.", "stem_conv."),
    (r"^stem\.1\.", "stem_bn."),
    (r"downsample\.0\.", "downsample.conv."),
    (r"downsample\.1\.", "downsample.bn."),
    (r"^fc\.0\.", "fc.norm1."),
    (r"^fc\.2\.", "fc.fc1."),
    (r"^fc\.4\.", "fc.norm2."),
    (r"^fc\.6\.", "fc.fc2."),
];

impl<B: Backend> ResNet3d<B> {
    /// Load weights from a ``torch`` weights path onto this model.
    ///
    /// The model must have been built with batch normalization,
    /// and with a structure matching the archive.
    pub fn load_pytorch_weights(
        self,
        path: PathBuf,
    ) -> anyhow::Result<Self> {
        load_pytorch_weights(self, path)
    }
}

/// Load weights from ``torch`` weights path onto a [`ResNet3d`] model.
#[tracing::instrument(skip(resnet))]
pub fn load_pytorch_weights<B: Backend>(
    resnet: ResNet3d<B>,
    path: PathBuf,
) -> anyhow::Result<ResNet3d<B>> {
    let device = resnet
        .devices()
        .into_iter()
        .next()
        .context("model has no parameters")?;
    let record = load_resnet3d_stub_record::<B>(path, &device)?;
    record.copy_weights(resnet)
}

/// Load a [`ResNet3dStubRecord`] from ``torch`` weights path.
pub fn load_resnet3d_stub_record<B: Backend>(
    path: PathBuf,
    device: &B::Device,
) -> anyhow::Result<ResNet3dStubRecord<B>> {
    let load_args = KEY_REMAP.iter().fold(
        LoadArgs::new(path.clone()).with_top_level_key(STATE_DICT_KEY),
        |args, (pattern, replacement)| args.with_key_remap(pattern, replacement),
    );

    let record = PyTorchFileRecorder::<FullPrecisionSettings>::new()
        .load(load_args, device)
        .with_context(|| format!("loading torch weights from {}", path.display()))?;

    Ok(record)
}

#[derive(Module, Debug)]
pub struct ResNet3dStub<B: Backend> {
    pub stem_conv: Conv3d<B>,
    pub stem_bn: BatchNorm<B, 3>,
    pub layer1: Vec<ResidualBlockStub<B>>,
    pub layer2: Vec<ResidualBlockStub<B>>,
    pub layer3: Vec<ResidualBlockStub<B>>,
    pub layer4: Vec<ResidualBlockStub<B>>,
    pub fc: HeadStub<B>,
}

impl<B: Backend> ResNet3dStubRecord<B> {
    pub fn copy_weights(
        self,
        target: ResNet3d<B>,
    ) -> anyhow::Result<ResNet3d<B>> {
        Ok(ResNet3d {
            stem: Stem3d {
                cna: copy_cna_weights(self.stem_conv, self.stem_bn, target.stem.cna)
                    .context("stem")?,
            },
            layer1: copy_layer_weights(self.layer1, target.layer1).context("layer1")?,
            layer2: copy_layer_weights(self.layer2, target.layer2).context("layer2")?,
            layer3: copy_layer_weights(self.layer3, target.layer3).context("layer3")?,
            layer4: copy_layer_weights(self.layer4, target.layer4).context("layer4")?,
            fc: self.fc.copy_weights(target.fc),
            ..target
        })
    }
}

#[derive(Module, Debug)]
pub struct HeadStub<B: Backend> {
    pub norm1: BatchNorm<B, 0>,
    pub fc1: Linear<B>,
    pub norm2: BatchNorm<B, 0>,
    pub fc2: Linear<B>,
}

impl<B: Backend> HeadStubRecord<B> {
    pub fn copy_weights(
        self,
        target: ClassifierHead3d<B>,
    ) -> ClassifierHead3d<B> {
        ClassifierHead3d {
            norm1: target.norm1.load_record(self.norm1),
            fc1: target.fc1.load_record(self.fc1),
            norm2: target.norm2.load_record(self.norm2),
            fc2: target.fc2.load_record(self.fc2),
            ..target
        }
    }
}

pub fn copy_layer_weights<B: Backend>(
    stubs: Vec<ResidualBlockStubRecord<B>>,
    target: LayerBlock3d<B>,
) -> anyhow::Result<LayerBlock3d<B>> {
    if stubs.len() != target.blocks.len() {
        bail!(
            "stub has {} blocks, target has {}",
            stubs.len(),
            target.blocks.len()
        );
    }
    Ok(LayerBlock3d {
        blocks: stubs
            .into_iter()
            .zip(target.blocks)
            .enumerate()
            .map(|(idx, (s, t))| s.copy_weights(t).with_context(|| format!("block[{idx}]")))
            .collect::<anyhow::Result<Vec<_>>>()?,
    })
}

#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ResidualBlockStub<B: Backend> {
    Bottleneck(BottleneckStub<B>),
    Basic(BasicBlockStub<B>),
}

impl<B: Backend> ResidualBlockStubRecord<B> {
    pub fn copy_weights(
        self,
        target: ResidualBlock3d<B>,
    ) -> anyhow::Result<ResidualBlock3d<B>> {
        use ResidualBlock3d as T;
        use ResidualBlockStubRecord as S;
        match (self, target) {
            (S::Basic(stub), T::Basic(block)) => Ok(T::Basic(stub.copy_weights(block)?)),
            (S::Bottleneck(stub), T::Bottleneck(block)) => {
                Ok(T::Bottleneck(stub.copy_weights(block)?))
            }
            (S::Basic(_), T::Bottleneck(_)) => {
                bail!("Cannot apply basic block stub to bottleneck block")
            }
            (S::Bottleneck(_), T::Basic(_)) => {
                bail!("Cannot apply bottleneck block stub to basic block")
            }
        }
    }
}

pub fn copy_downsample_weights<B: Backend>(
    downsample: Option<DownsampleStubRecord<B>>,
    target: Option<Downsample3d<B>>,
) -> anyhow::Result<Option<Downsample3d<B>>> {
    match (downsample, target) {
        (Some(stub), Some(target)) => Ok(Some(stub.copy_weights(target)?)),
        (None, None) => Ok(None),
        (None, Some(_)) => bail!("None stub cannot be applied to Some<Downsample3d>"),
        (Some(_), None) => bail!("Some<Downsample3d> stub cannot be applied to None"),
    }
}

#[derive(Module, Debug)]
pub struct DownsampleStub<B: Backend> {
    pub conv: Conv3d<B>,
    pub bn: BatchNorm<B, 3>,
}

impl<B: Backend> DownsampleStubRecord<B> {
    pub fn copy_weights(
        self,
        target: Downsample3d<B>,
    ) -> anyhow::Result<Downsample3d<B>> {
        Ok(Downsample3d {
            conv_norm: copy_conv_norm_weights(self.conv, self.bn, target.conv_norm)?,
        })
    }
}

fn load_batch_norm<B: Backend>(
    bn: BatchNormRecord<B, 3>,
    target: Normalization<B>,
) -> anyhow::Result<Normalization<B>> {
    match target {
        Normalization::Batch(norm) => Ok(Normalization::Batch(norm.load_record(bn))),
        other => bail!("torch batch norm weights cannot be applied to {other:?}"),
    }
}

pub fn copy_cna_weights<B: Backend>(
    conv: Conv3dRecord<B>,
    bn: BatchNormRecord<B, 3>,
    target: CNA3d<B>,
) -> anyhow::Result<CNA3d<B>> {
    Ok(CNA3d {
        conv: target.conv.load_record(conv),
        norm: load_batch_norm(bn, target.norm)?,
        ..target
    })
}

pub fn copy_conv_norm_weights<B: Backend>(
    conv: Conv3dRecord<B>,
    bn: BatchNormRecord<B, 3>,
    target: ConvNorm3d<B>,
) -> anyhow::Result<ConvNorm3d<B>> {
    Ok(ConvNorm3d {
        conv: target.conv.load_record(conv),
        norm: load_batch_norm(bn, target.norm)?,
    })
}

#[derive(Module, Debug)]
pub struct BasicBlockStub<B: Backend> {
    pub conv1: Conv3d<B>,
    pub bn1: BatchNorm<B, 3>,
    pub conv2: Conv3d<B>,
    pub bn2: BatchNorm<B, 3>,
    pub downsample: Option<DownsampleStub<B>>,
}

impl<B: Backend> BasicBlockStubRecord<B> {
    pub fn copy_weights(
        self,
        target: BasicBlock3d<B>,
    ) -> anyhow::Result<BasicBlock3d<B>> {
        Ok(BasicBlock3d {
            downsample: copy_downsample_weights(self.downsample, target.downsample)?,
            cna1: copy_cna_weights(self.conv1, self.bn1, target.cna1)?,
            cna2: copy_cna_weights(self.conv2, self.bn2, target.cna2)?,
        })
    }
}

#[derive(Module, Debug)]
pub struct BottleneckStub<B: Backend> {
    pub conv1: Conv3d<B>,
    pub bn1: BatchNorm<B, 3>,
    pub conv2: Conv3d<B>,
    pub bn2: BatchNorm<B, 3>,
    pub conv3: Conv3d<B>,
    pub bn3: BatchNorm<B, 3>,
    pub downsample: Option<DownsampleStub<B>>,
}

impl<B: Backend> BottleneckStubRecord<B> {
    pub fn copy_weights(
        self,
        target: BottleneckBlock3d<B>,
    ) -> anyhow::Result<BottleneckBlock3d<B>> {
        Ok(BottleneckBlock3d {
            downsample: copy_downsample_weights(self.downsample, target.downsample)?,
            cna1: copy_cna_weights(self.conv1, self.bn1, target.cna1)?,
            cna2: copy_cna_weights(self.conv2, self.bn2, target.cna2)?,
            cna3: copy_cna_weights(self.conv3, self.bn3, target.cna3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::normalization_wrapper::NormalizationConfig;
    use crate::layers::blocks::cna::{AbstractCNA3dConfig, CNA3dConfig};
    use crate::testing::assert_close;
    use burn::backend::NdArray;
    use burn::nn::conv::Conv3dConfig;
    use burn::nn::{BatchNormConfig, GroupNormConfig};
    use burn::prelude::Tensor;

    type B = NdArray<f32>;

    fn cna_config(norm: NormalizationConfig) -> CNA3dConfig {
        AbstractCNA3dConfig {
            norm,
            act: Default::default(),
        }
        .build_config(Conv3dConfig::new([2, 4], [1, 1, 1]).with_bias(false))
    }

    fn source_records() -> (Conv3dRecord<B>, BatchNormRecord<B, 3>) {
        let device = Default::default();
        let conv: Conv3d<B> = Conv3dConfig::new([2, 4], [1, 1, 1])
            .with_bias(false)
            .init(&device);
        let mut conv = conv.into_record();
        conv.weight = conv.weight.map(|w| w.full_like(0.5));

        let bn: BatchNorm<B, 3> = BatchNormConfig::new(4).init(&device);
        let mut bn = bn.into_record();
        bn.gamma = bn.gamma.map(|g| g.full_like(0.25));

        (conv, bn)
    }

    #[test]
    fn test_copy_cna_weights() {
        let device = Default::default();
        let target: CNA3d<B> = cna_config(NormalizationConfig::default()).init(&device);
        let (conv, bn) = source_records();

        let copied = copy_cna_weights(conv, bn, target).unwrap();
        assert_close(
            copied.conv.weight.val(),
            Tensor::full([4, 2, 1, 1, 1], 0.5, &device),
            1e-6,
        );
        match &copied.norm {
            Normalization::Batch(_) => assert_close(
                copied.norm.weight().unwrap(),
                Tensor::full([4], 0.25, &device),
                1e-6,
            ),
            other => panic!("unexpected norm {other:?}"),
        }
    }

    #[test]
    fn test_copy_rejects_non_batch_norm() {
        let device = Default::default();
        let target: CNA3d<B> =
            cna_config(GroupNormConfig::new(2, 4).into()).init(&device);
        let (conv, bn) = source_records();

        let err = copy_cna_weights(conv, bn, target).unwrap_err();
        assert!(err.to_string().contains("cannot be applied"));
    }

    #[test]
    fn test_copy_downsample_mismatch() {
        assert!(copy_downsample_weights::<B>(None, None).unwrap().is_none());

        let (conv, bn) = source_records();
        let stub = DownsampleStubRecord { conv, bn };
        let err = copy_downsample_weights::<B>(Some(stub), None).unwrap_err();
        assert!(err.to_string().contains("cannot be applied to None"));
    }
}
