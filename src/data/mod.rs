//! Input data: remote time-series sources and the synthetic fallback.

pub mod jhu;
pub mod sample;

pub use jhu::*;
pub use sample::*;
