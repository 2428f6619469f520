//! Wide → long reshaping and the three-series combine step.
//!
//! - `reshape`: melt a wide table into long rows (and pivot back)
//! - `combine`: join the three long tables, fill gaps, derive metrics

pub mod combine;
pub mod reshape;

pub use combine::*;
pub use reshape::*;
