//! # Pooling Layers
pub mod adaptive_avg_pool_3d;

pub use adaptive_avg_pool_3d::*;
