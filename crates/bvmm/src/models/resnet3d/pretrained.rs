//! # Pretrained `ResNet3d` Configs and Weights
//!
//! The published weights were trained on UCF101, from 3 channel video clips;
//! they fit only configs with ``in_channels = 3`` and ``num_classes = 101``.

use crate::cache::prefabs::{StaticPreFabConfig, StaticPreFabMap};
use crate::cache::weights::{StaticPretrainedWeightsDescriptor, StaticPretrainedWeightsMap};
use crate::models::resnet3d::prefabs::{
    RESNET18_3D_BLOCKS, RESNET34_3D_BLOCKS, RESNET50_3D_BLOCKS, RESNET101_3D_BLOCKS,
    RESNET152_3D_BLOCKS,
};
use crate::models::resnet3d::residual_block::ResidualBlockKind;
use crate::models::resnet3d::resnet_model::{ResNet3dConfig, ResNet3dMeta};

/// Input channels of the published weights.
pub const PRETRAINED_IN_CHANNELS: usize = 3;

/// Output classes of the published weights.
pub const PRETRAINED_NUM_CLASSES: usize = 101;

/// Name of the published UCF101 weights, in each weights map.
pub const UCF101_WEIGHTS: &str = "ucf101";

const ORIGIN: Option<&str> = Some("https://github.com/kbressem/faimed3d");

/// Check that a config can hold the published weights.
pub fn check_pretrained_compatible(config: &ResNet3dConfig) -> anyhow::Result<()> {
    if config.in_channels() != PRETRAINED_IN_CHANNELS
        || config.num_classes() != PRETRAINED_NUM_CLASSES
    {
        anyhow::bail!(
            "pretrained weights require in_channels={} and num_classes={}; got in_channels={}, num_classes={}",
            PRETRAINED_IN_CHANNELS,
            PRETRAINED_NUM_CLASSES,
            config.in_channels(),
            config.num_classes(),
        );
    }
    Ok(())
}

/// Well-known [`super::resnet_model::ResNet3d`] configs and weights.
pub static PREFAB_RESNET3D_MAP: StaticPreFabMap<ResNet3dConfig> = StaticPreFabMap {
    name: "resnet3d",
    description: "Well-Known ResNet3d configs",

    items: &[
        &StaticPreFabConfig {
            name: "resnet18_3d",
            description: "ResNet18-3D [2, 2, 2, 2] BasicBlocks",
            builder: || ResNet3dConfig::new(ResidualBlockKind::Basic, RESNET18_3D_BLOCKS),
            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: UCF101_WEIGHTS,
                    description: "ResNet18-3D pretrained on UCF101",
                    license: None,
                    origin: ORIGIN,
                    urls: &["https://rad-ai.charite.de/pretrained_models/resnet18_3d_ucf100.pth"],
                }],
            }),
        },
        &StaticPreFabConfig {
            name: "resnet34_3d",
            description: "ResNet34-3D [3, 4, 6, 3] BasicBlocks",
            builder: || ResNet3dConfig::new(ResidualBlockKind::Basic, RESNET34_3D_BLOCKS),
            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: UCF101_WEIGHTS,
                    description: "ResNet34-3D pretrained on UCF101",
                    license: None,
                    origin: ORIGIN,
                    urls: &["https://rad-ai.charite.de/pretrained_models/resnet34_3d_ucf100.pth"],
                }],
            }),
        },
        &StaticPreFabConfig {
            name: "resnet50_3d",
            description: "ResNet50-3D [3, 4, 6, 3] Bottleneck",
            builder: || ResNet3dConfig::new(ResidualBlockKind::Bottleneck, RESNET50_3D_BLOCKS),
            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: UCF101_WEIGHTS,
                    description: "ResNet50-3D pretrained on UCF101",
                    license: None,
                    origin: ORIGIN,
                    urls: &["https://rad-ai.charite.de/pretrained_models/resnet50_3d_ucf100.pth"],
                }],
            }),
        },
        &StaticPreFabConfig {
            name: "resnet101_3d",
            description: "ResNet101-3D [3, 4, 23, 3] Bottleneck",
            builder: || ResNet3dConfig::new(ResidualBlockKind::Bottleneck, RESNET101_3D_BLOCKS),
            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: UCF101_WEIGHTS,
                    description: "ResNet101-3D pretrained on UCF101",
                    license: None,
                    origin: ORIGIN,
                    urls: &["https://rad-ai.charite.de/pretrained_models/resnet101_3d_ucf100.pth"],
                }],
            }),
        },
        &StaticPreFabConfig {
            name: "resnet152_3d",
            description: "ResNet152-3D [3, 8, 36, 3] Bottleneck",
            builder: || ResNet3dConfig::new(ResidualBlockKind::Bottleneck, RESNET152_3D_BLOCKS),
            weights: None,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefab_registry() {
        assert_eq!(
            PREFAB_RESNET3D_MAP.names(),
            vec![
                "resnet18_3d",
                "resnet34_3d",
                "resnet50_3d",
                "resnet101_3d",
                "resnet152_3d"
            ]
        );

        for depth in [18, 34, 50, 101] {
            let name = format!("resnet{depth}_3d");
            let prefab = PREFAB_RESNET3D_MAP.expect_lookup_prefab(&name);
            assert!(prefab.has_weights());

            let weights = prefab
                .weights
                .as_ref()
                .unwrap()
                .try_lookup_by_name(UCF101_WEIGHTS)
                .unwrap();
            assert_eq!(
                prefab.weights.as_ref().unwrap().default_weights().unwrap().name,
                UCF101_WEIGHTS
            );
            assert_eq!(
                weights.url().unwrap(),
                format!("https://rad-ai.charite.de/pretrained_models/resnet{depth}_3d_ucf100.pth")
            );

            let config = prefab.new_config();
            assert!(check_pretrained_compatible(&config).is_ok());
        }

        let prefab = PREFAB_RESNET3D_MAP.expect_lookup_prefab("resnet152_3d");
        assert!(!prefab.has_weights());
        assert_eq!(prefab.new_config().layers, [3, 8, 36, 3]);
    }

    #[test]
    fn test_pretrained_compatibility() {
        let config = ResNet3dConfig::new(ResidualBlockKind::Basic, RESNET18_3D_BLOCKS);
        assert!(check_pretrained_compatible(&config).is_ok());

        let err = check_pretrained_compatible(&config.clone().with_num_classes(10)).unwrap_err();
        assert!(err.to_string().contains("num_classes=10"));

        assert!(check_pretrained_compatible(&config.with_in_channels(1)).is_err());
    }
}
