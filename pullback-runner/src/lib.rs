//! Pullback Runner: batch evaluation over many sessions.
//!
//! - `config`: run config files (inputs, parallelism, `[pipeline]` section)
//! - `data_loader`: CSV adapters for intraday bars, daily bars and history
//! - `batch`: rayon-parallel evaluation with shared table and filter stats
//! - `export`: JSON and CSV reports

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;

pub use batch::{
    run_from_config, BatchReport, BatchRunner, RunError, SessionInput, SessionOutcome,
    SessionReport, SignalRecord,
};
pub use config::{InputPaths, RunConfig};
pub use data_loader::LoadError;
