//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - series identity (`Metric`, `EntityId`)
//! - the three table shapes (`WideTable`, `LongTable`, `MergedRow`)
//! - run configuration (`PipelineConfig`)

pub mod config;
pub mod types;

pub use config::*;
pub use types::*;
