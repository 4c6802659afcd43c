//! # 3D `ResNet`
//!
//! A `ResNet` family for video / volumetric classification;
//! inputs are ``[batch, channels, depth, height, width]``.
//!
//! * [`resnet_model`] - the network, and its config.
//! * [`prefabs`] - named depths; 18, 34, 50, 101 and 152.
//! * [`pretrained`] - the published UCF101 weights.
//! * [`backbone`] - multi-scale feature extraction.

pub mod backbone;
pub mod basic_block;
pub mod bottleneck;
pub mod downsample;
pub mod head;
pub mod layer_block;
pub mod layer_builder;
pub mod prefabs;
pub mod pretrained;
pub mod residual_block;
pub mod resnet_io;
pub mod resnet_model;
pub mod stem;
pub mod util;
