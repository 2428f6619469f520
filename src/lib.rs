//! `covid-pipeline` library crate.
//!
//! The binary (`covid`) is a thin wrapper around this library so that the
//! stages are testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod plot;
pub mod report;
pub mod store;
pub mod transform;
