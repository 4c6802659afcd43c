#![warn(missing_docs)]
//!# bvmm - Burn Volumetric Models
//!
//! ## Notable Components
//!
//! * [`cache`] - weight loading cache.
//! * [`compat`] - compat code, ported or planned for an upcoming release of ``burn``.
//!   * [`compat::activation_wrapper::Activation`] - activation layer abstraction wrapper.
//!   * [`compat::normalization_wrapper::Normalization`] - norm layer abstraction wrapper.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::blocks`] - miscellaneous blocks.
//!     * [`layers::blocks::cna`] - ``Conv3d + Norm + Act`` block.
//!     * [`layers::blocks::conv_norm`] - ``Conv3d + Norm`` block.
//!   * [`layers::pool`] - pooling layers.
//!     * [`layers::pool::adaptive_avg_pool_3d`] - adaptive 3d average pooling.
//! * [`models`] - complete model families.
//!   * [`models::resnet3d`] - 3D `ResNet` for video / volumetric classification.
//!     * [`models::resnet3d::prefabs`] - `resnet18_3d` through `resnet152_3d`.
//!     * [`models::resnet3d::backbone`] - multi-scale feature extraction.
//! * [`utility`] - model inspection helpers.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;

#[cfg(test)]
pub(crate) mod testing;

pub mod layers;

pub mod cache;
pub mod models;
pub mod utility;
