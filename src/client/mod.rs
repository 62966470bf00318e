//! HTTP client module
//!
//! This module handles:
//! - Rotating user agents and proxies loaded from identity documents
//! - Retrying requests through rate limits and transient failures
//! - Leasing one client per worker with its own connection pools

pub mod identity;
mod rate_limited;

pub use identity::{load_account, Account, IdentityPool, ProxyDescriptor};
pub use rate_limited::{ClientPool, ClientSettings, RateLimitedClient, RetryStats};
