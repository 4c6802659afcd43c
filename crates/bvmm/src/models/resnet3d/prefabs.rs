//! # Named `ResNet3d` Depths
//!
//! | depth | block      | blocks per stage  | weights |
//! |-------|------------|-------------------|---------|
//! | 18    | Basic      | ``[2, 2, 2, 2]``  | UCF101  |
//! | 34    | Basic      | ``[3, 4, 6, 3]``  | UCF101  |
//! | 50    | Bottleneck | ``[3, 4, 6, 3]``  | UCF101  |
//! | 101   | Bottleneck | ``[3, 4, 23, 3]`` | UCF101  |
//! | 152   | Bottleneck | ``[3, 8, 36, 3]`` | none    |
//!
//! Each constructor takes a `configure` hook, applied to the
//! named config before the network is built.

use crate::cache::disk::DiskCacheConfig;
use crate::models::resnet3d::pretrained::{PREFAB_RESNET3D_MAP, check_pretrained_compatible};
use crate::models::resnet3d::resnet_model::{ResNet3d, ResNet3dConfig};
use burn::prelude::Backend;

/// [`ResNet3d`]-18 blocks per stage.
pub const RESNET18_3D_BLOCKS: [usize; 4] = [2, 2, 2, 2];
/// [`ResNet3d`]-34 blocks per stage.
pub const RESNET34_3D_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// [`ResNet3d`]-50 blocks per stage.
pub const RESNET50_3D_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// [`ResNet3d`]-101 blocks per stage.
pub const RESNET101_3D_BLOCKS: [usize; 4] = [3, 4, 23, 3];
/// [`ResNet3d`]-152 blocks per stage.
pub const RESNET152_3D_BLOCKS: [usize; 4] = [3, 8, 36, 3];

/// Build a named [`ResNet3d`].
///
/// # Arguments
///
/// - `name`: a name in [`PREFAB_RESNET3D_MAP`].
/// - `pretrained`: load the published weights, if any.
///   Without published weights, logs a warning and keeps the random init.
/// - `configure`: edits the named config before it is built.
/// - `device`: the target device.
pub fn resnet3d_from_prefab<B, F>(
    name: &str,
    pretrained: bool,
    configure: F,
    device: &B::Device,
) -> anyhow::Result<ResNet3d<B>>
where
    B: Backend,
    F: FnOnce(ResNet3dConfig) -> ResNet3dConfig,
{
    let prefab = PREFAB_RESNET3D_MAP.try_lookup_prefab(name)?;
    let config = configure(prefab.new_config());

    let weights = if pretrained {
        let weights = prefab
            .weights
            .as_ref()
            .and_then(|weights| weights.default_weights());
        if weights.is_some() {
            check_pretrained_compatible(&config)?;
        } else {
            tracing::warn!(
                name,
                "no pretrained version is available; using randomly initialized weights"
            );
        }
        weights
    } else {
        None
    };

    let model = config.try_init(device)?;

    match weights {
        None => Ok(model),
        Some(weights) => {
            let path = weights.fetch_weights(&DiskCacheConfig::default())?;
            model.load_pytorch_weights(path)
        }
    }
}

/// `ResNet18-3D`; Basic ``[2, 2, 2, 2]``.
pub fn resnet18_3d<B, F>(
    pretrained: bool,
    configure: F,
    device: &B::Device,
) -> anyhow::Result<ResNet3d<B>>
where
    B: Backend,
    F: FnOnce(ResNet3dConfig) -> ResNet3dConfig,
{
    resnet3d_from_prefab("resnet18_3d", pretrained, configure, device)
}

/// `ResNet34-3D`; Basic ``[3, 4, 6, 3]``.
pub fn resnet34_3d<B, F>(
    pretrained: bool,
    configure: F,
    device: &B::Device,
) -> anyhow::Result<ResNet3d<B>>
where
    B: Backend,
    F: FnOnce(ResNet3dConfig) -> ResNet3dConfig,
{
    resnet3d_from_prefab("resnet34_3d", pretrained, configure, device)
}

/// `ResNet50-3D`; Bottleneck ``[3, 4, 6, 3]``.
pub fn resnet50_3d<B, F>(
    pretrained: bool,
    configure: F,
    device: &B::Device,
) -> anyhow::Result<ResNet3d<B>>
where
    B: Backend,
    F: FnOnce(ResNet3dConfig) -> ResNet3dConfig,
{
    resnet3d_from_prefab("resnet50_3d", pretrained, configure, device)
}

/// `ResNet101-3D`; Bottleneck ``[3, 4, 23, 3]``.
pub fn resnet101_3d<B, F>(
    pretrained: bool,
    configure: F,
    device: &B::Device,
) -> anyhow::Result<ResNet3d<B>>
where
    B: Backend,
    F: FnOnce(ResNet3dConfig) -> ResNet3dConfig,
{
    resnet3d_from_prefab("resnet101_3d", pretrained, configure, device)
}

/// `ResNet152-3D`; Bottleneck ``[3, 8, 36, 3]``.
///
/// There are no published weights; `pretrained` only logs a warning.
pub fn resnet152_3d<B, F>(
    pretrained: bool,
    configure: F,
    device: &B::Device,
) -> anyhow::Result<ResNet3d<B>>
where
    B: Backend,
    F: FnOnce(ResNet3dConfig) -> ResNet3dConfig,
{
    resnet3d_from_prefab("resnet152_3d", pretrained, configure, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet3d::layer_block::LayerBlock3dMeta;
    use crate::models::resnet3d::resnet_model::ResNet3dMeta;
    use crate::testing::kaiming_fan_out_std;
    use crate::utility::burn::stats::TensorStats;
    use burn::backend::NdArray;
    use burn::module::Module;
    use burn::prelude::Tensor;
    use burn::tensor::Distribution;

    #[test]
    fn test_resnet18_3d() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: ResNet3d<B> =
            resnet18_3d(false, |config| config.with_num_classes(5), &device).unwrap();
        assert_eq!(model.num_classes(), 5);
        assert_eq!(
            model.stages().map(|stage| stage.len()),
            RESNET18_3D_BLOCKS
        );

        let input = Tensor::random([1, 3, 2, 16, 16], Distribution::Default, &device);
        assert_eq!(model.forward(input).dims(), [1, 5]);
    }

    #[test]
    #[ignore = "builds every full-depth network; run with --release --ignored"]
    fn test_every_depth_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        for name in PREFAB_RESNET3D_MAP.names() {
            let model: ResNet3d<B> =
                resnet3d_from_prefab(name, false, |config| config.with_num_classes(7), &device)
                    .unwrap();

            let input = Tensor::random([2, 3, 2, 16, 16], Distribution::Default, &device);
            assert_eq!(model.forward(input).dims(), [2, 7], "{name}");
        }
    }

    #[test]
    fn test_depth_structure() {
        let cases = [
            ("resnet18_3d", RESNET18_3D_BLOCKS, 512),
            ("resnet34_3d", RESNET34_3D_BLOCKS, 512),
            ("resnet50_3d", RESNET50_3D_BLOCKS, 2048),
            ("resnet101_3d", RESNET101_3D_BLOCKS, 2048),
            ("resnet152_3d", RESNET152_3D_BLOCKS, 2048),
        ];
        for (name, blocks, features) in cases {
            let config = PREFAB_RESNET3D_MAP.expect_lookup_prefab(name).new_config();
            assert_eq!(config.layers, blocks);
            assert_eq!(config.feature_channels()[4], features);
            assert_eq!(config.num_classes, 101);
            assert!(config.try_validate().is_ok());
        }
    }

    #[test]
    fn test_pretrained_fallback_without_weights() {
        type B = NdArray<f32>;
        let device = Default::default();

        // Shrink the stages; the fallback does not depend on depth.
        let shrink = |config: ResNet3dConfig| ResNet3dConfig {
            layers: [1, 1, 1, 1],
            ..config
        };

        let pretrained: ResNet3d<B> = resnet152_3d(true, shrink, &device).unwrap();
        let random: ResNet3d<B> = resnet152_3d(false, shrink, &device).unwrap();

        assert_eq!(pretrained.num_params(), random.num_params());
        assert_eq!(pretrained.feature_channels(), random.feature_channels());

        // Both builds carry the same fresh Kaiming init.
        let pretrained_convs = pretrained.named_conv_weights();
        let random_convs = random.named_conv_weights();
        assert_eq!(pretrained_convs.len(), random_convs.len());

        for ((name, a), (other, b)) in pretrained_convs.into_iter().zip(random_convs) {
            assert_eq!(name, other);
            assert_eq!(a.dims(), b.dims(), "{name}");

            let [out_channels, _, k0, k1, k2] = a.dims();
            let expected = kaiming_fan_out_std(2.0_f64.sqrt(), out_channels, k0 * k1 * k2);

            for stats in [TensorStats::of(a), TensorStats::of(b)] {
                assert!(
                    (stats.std - expected).abs() / expected < 0.1,
                    "{name}: std {} vs {expected}",
                    stats.std
                );
                assert!(stats.mean.abs() < 0.1 * expected, "{name}: {stats}");
            }
        }
    }

    #[test]
    fn test_pretrained_incompatible_config() {
        type B = NdArray<f32>;
        let device = Default::default();

        // Fails before anything is fetched.
        let err = resnet18_3d::<B, _>(true, |config| config.with_num_classes(10), &device)
            .unwrap_err();
        assert!(err.to_string().contains("pretrained weights require"));

        let err = resnet50_3d::<B, _>(true, |config| config.with_in_channels(1), &device)
            .unwrap_err();
        assert!(err.to_string().contains("in_channels=1"));
    }

    #[test]
    fn test_unknown_prefab() {
        type B = NdArray<f32>;
        let err = resnet3d_from_prefab::<B, _>("resnet9_3d", false, |c| c, &Default::default())
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
