//! Dispatch module for running classifications concurrently
//!
//! This module handles:
//! - The FIFO work queue the workers drain
//! - The item processors that fetch and classify one item
//! - The bounded worker pool and its flush-on-every-exit guarantee
//! - Seeding a store from classifications already made elsewhere

mod pool;
mod prepare;
mod processor;
mod queue;

pub use pool::{DispatchSettings, Dispatcher, FlushGuard, RunReport, RunStatus};
pub use prepare::seed_from_reference;
pub use processor::{CatalogPipeline, ItemProcessor, OwnedPipeline};
pub use queue::WorkQueue;
