//! # Utilities

pub mod burn;
