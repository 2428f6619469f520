//! Static chart rendering for the analysis stage.

pub mod charts;

pub use charts::*;
