//! Store module for persisting classifications
//!
//! This module handles:
//! - Loading and rewriting the JSON document that holds every classification
//! - Deep search, deep delete and deep merge over the document tree
//! - The mutex-guarded handle shared by the worker pool
//! - Read-only loading of auxiliary documents (identity pools, accounts)

mod document;
mod value;

pub use document::{Access, CacheHit, Store};
pub use value::{Scalar, Value};

use crate::StoreResult;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opens a store for a crawl run
pub fn open_store(path: &Path) -> StoreResult<Store> {
    Store::open(path, Access::ReadWrite)
}

/// Mutex-guarded store shared between workers
///
/// Every mutation made while a run is in progress goes through [`SharedStore::lock`].
/// Holding the guard across an await point makes the future `!Send`, so it could
/// no longer be spawned on the runtime; release it before awaiting.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Store>>,
}

impl SharedStore {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Locks the store, recovering from a poisoned lock
    pub fn lock(&self) -> MutexGuard<'_, Store> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flushes the store to disk
    pub fn flush(&self) -> StoreResult<()> {
        self.lock().flush()
    }
}

impl From<Store> for SharedStore {
    fn from(store: Store) -> Self {
        Self::new(store)
    }
}
