//! # Complete Model Families
pub mod resnet3d;
