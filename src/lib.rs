//! Cardsift: a resumable catalog crawler
//!
//! This crate walks a remote application catalog through a rate-limited HTTP API,
//! sorts every item into one of a few mutually exclusive buckets and keeps the
//! result in a JSON document that is both the checkpoint for the next run and the
//! final output.

pub mod classify;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod output;
pub mod remote;
pub mod store;

use thiserror::Error;

/// Main error type for Cardsift operations
#[derive(Debug, Error)]
pub enum SiftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("HTTP client error: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("Invalid proxy descriptor: {0}")]
    InvalidProxy(String),

    #[error("Request to {url} cannot be built: {message}")]
    Request { url: String, message: String },

    #[error("Unexpected payload from {url}: {message}")]
    Payload { url: String, message: String },

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SiftError {
    /// Returns true if this error must end the whole run
    ///
    /// Item-level errors (an unexpected payload for one item) are logged and the
    /// item is dropped; everything else aborts the run after the store is flushed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Payload { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Store-specific errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Malformed document {path}: {source}")]
    MalformedDocument {
        path: String,
        source: serde_json::Error,
    },

    #[error("{0} is not writable")]
    NotWritable(String),

    #[error("Key not found: {0}")]
    ItemNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Cardsift operations
pub type Result<T> = std::result::Result<T, SiftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// Re-export commonly used types
pub use classify::{Bucket, ClassificationRecord};
pub use config::Config;
pub use store::{SharedStore, Store};
