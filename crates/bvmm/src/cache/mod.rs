//! # Module / Weight Caches
//!
//! * [`disk`] - read-through disk cache policy.
//! * [`weights`] - pretrained weight descriptors, and their cache keys.
//! * [`prefabs`] - named, well-known model configs.

pub mod disk;
pub mod prefabs;
pub mod weights;
