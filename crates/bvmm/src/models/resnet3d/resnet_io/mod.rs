//! # `ResNet3d` Weight I/O
//!
//! * [`pytorch_stubs`] - load published ``torch`` archives.

pub mod pytorch_stubs;
