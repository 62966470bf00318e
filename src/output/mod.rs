//! Output module for summarizing classification results
//!
//! This module handles:
//! - Counting classified items per bucket in a store
//! - Printing store statistics
//! - Logging the outcome of a run

pub mod stats;

pub use stats::{load_statistics, log_run_report, print_statistics, StoreStatistics};
