//! # ``burn`` Inspection Utilities
//!
//! * [`record`] - record structure summaries.
//! * [`stats`] - tensor statistics.

pub mod record;
pub mod stats;
