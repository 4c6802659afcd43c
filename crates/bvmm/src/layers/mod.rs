//! Common low-level modules for volumetric networks in Burn.
pub mod blocks;
pub mod pool;
