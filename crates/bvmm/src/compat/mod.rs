//! # Compat Layers
//!
//! Wrappers smoothing over module families which ``burn`` does not (yet)
//! expose behind a single config/module enum.

pub mod activation_wrapper;
pub mod normalization_wrapper;
