//! Input/output helpers.
//!
//! - wide time-series CSV ingest + validation (`ingest`)
//! - combined-table CSV export/reload and the Power-BI copy (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
