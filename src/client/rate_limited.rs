//! Rate-limit aware HTTP client
//!
//! Every call loops until it gets a decoded payload:
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 429 | sleep the rate-limit cooldown, retry |
//! | Timeout, connection error | sleep the transient backoff, retry |
//! | Other non-2xx status | sleep the transient backoff, retry |
//! | Body is not JSON | sleep the transient backoff, retry |
//! | Request cannot be built | return the error |
//! | 2xx with JSON body | return the payload |
//!
//! There is no retry ceiling. Callers that need a deadline cancel the future.

use crate::client::identity::IdentityPool;
use crate::config::CrawlerConfig;
use crate::SiftError;
use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Method, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Timeouts and retry delays
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Sleep after a 429 response
    pub rate_limit_cooldown: Duration,

    /// Sleep after any other failure
    pub transient_backoff: Duration,

    /// Per-call timeout for GET
    pub read_timeout: Duration,

    /// Per-call timeout for POST
    pub write_timeout: Duration,

    /// Route each call through a random proxy from the pool
    pub use_proxy: bool,
}

impl ClientSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            rate_limit_cooldown: Duration::from_secs(config.rate_limit_cooldown_secs),
            transient_backoff: Duration::from_millis(config.transient_backoff_ms),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
            use_proxy: config.use_proxy,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: Duration::from_secs(60),
            transient_backoff: Duration::from_secs(1),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(15),
            use_proxy: false,
        }
    }
}

/// Outcome of a single attempt
#[derive(Debug)]
enum Attempt {
    Success(serde_json::Value),
    RateLimited,
    Transient(String),
    Fatal(SiftError),
}

/// Retry counts, summed over every client leased from the same pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub rate_limited: u64,
    pub transient: u64,
}

#[derive(Debug, Default)]
struct RetryCounters {
    rate_limited: AtomicU64,
    transient: AtomicU64,
}

impl RetryCounters {
    fn snapshot(&self) -> RetryStats {
        RetryStats {
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            transient: self.transient.load(Ordering::Relaxed),
        }
    }
}

/// A connection pool bound to one proxy (or none)
#[derive(Debug, Clone)]
struct Route {
    http: Client,
    via_proxy: bool,
}

/// Builds one [`RateLimitedClient`] per worker
#[derive(Debug, Clone)]
pub struct ClientPool {
    settings: ClientSettings,
    identities: Arc<IdentityPool>,
    counters: Arc<RetryCounters>,
}

impl ClientPool {
    /// Creates a pool
    ///
    /// # Errors
    ///
    /// * `SiftError::InvalidProxy` - Proxying is enabled but the proxy pool is empty
    pub fn new(settings: ClientSettings, identities: Arc<IdentityPool>) -> Result<Self, SiftError> {
        if settings.use_proxy && identities.proxies().is_empty() {
            return Err(SiftError::InvalidProxy(
                "proxying is enabled but no proxies were loaded".to_string(),
            ));
        }

        Ok(Self {
            settings,
            identities,
            counters: Arc::new(RetryCounters::default()),
        })
    }

    /// Leases a client with its own connection pools
    pub fn lease(&self) -> Result<RateLimitedClient, SiftError> {
        let routes = if self.settings.use_proxy {
            self.identities
                .proxies()
                .iter()
                .map(|descriptor| -> Result<Route, SiftError> {
                    let proxy = reqwest::Proxy::all(descriptor.to_url())
                        .map_err(|e| SiftError::InvalidProxy(format!("{}: {}", descriptor.host, e)))?;
                    Ok(Route {
                        http: base_builder().proxy(proxy).build()?,
                        via_proxy: true,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            vec![Route {
                http: base_builder().no_proxy().build()?,
                via_proxy: false,
            }]
        };

        Ok(RateLimitedClient {
            routes,
            identities: Arc::clone(&self.identities),
            settings: self.settings.clone(),
            counters: Arc::clone(&self.counters),
        })
    }

    /// Retry counts across every leased client
    pub fn stats(&self) -> RetryStats {
        self.counters.snapshot()
    }
}

fn base_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
}

/// HTTP client that retries until it gets a payload
#[derive(Debug, Clone)]
pub struct RateLimitedClient {
    routes: Vec<Route>,
    identities: Arc<IdentityPool>,
    settings: ClientSettings,
    counters: Arc<RetryCounters>,
}

impl RateLimitedClient {
    /// GET with query parameters
    pub async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, SiftError> {
        self.send(Method::GET, url, params).await
    }

    /// POST with a form body
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<serde_json::Value, SiftError> {
        self.send(Method::POST, url, form).await
    }

    /// Sends a request, retrying until a JSON payload is decoded
    ///
    /// GET parameters go to the query string; any other method sends them as a
    /// form body and uses the write timeout.
    ///
    /// # Errors
    ///
    /// Only errors that a retry cannot fix are returned; see the module table.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, SiftError> {
        loop {
            match self.attempt(&method, url, params).await {
                Attempt::Success(payload) => return Ok(payload),
                Attempt::RateLimited => {
                    self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "Rate limited by {}, cooling down for {:?}",
                        url,
                        self.settings.rate_limit_cooldown
                    );
                    tokio::time::sleep(self.settings.rate_limit_cooldown).await;
                }
                Attempt::Transient(reason) => {
                    self.counters.transient.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        "Transient failure for {}: {} (retrying in {:?})",
                        url,
                        reason,
                        self.settings.transient_backoff
                    );
                    tokio::time::sleep(self.settings.transient_backoff).await;
                }
                Attempt::Fatal(err) => return Err(err),
            }
        }
    }

    /// Retry counts of the pool this client was leased from
    pub fn stats(&self) -> RetryStats {
        self.counters.snapshot()
    }

    async fn attempt(&self, method: &Method, url: &str, params: &[(&str, String)]) -> Attempt {
        let Some(route) = self.routes.choose(&mut rand::thread_rng()) else {
            return Attempt::Fatal(SiftError::InvalidProxy("no routes available".to_string()));
        };
        let user_agent = self.identities.pick_user_agent();

        let request = route
            .http
            .request(method.clone(), url)
            .header(USER_AGENT, user_agent);
        let request = if *method == Method::GET {
            request.query(params).timeout(self.settings.read_timeout)
        } else {
            request.form(params).timeout(self.settings.write_timeout)
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => {
                return Attempt::Fatal(SiftError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                });
            }
            Err(e) => return Attempt::Transient(describe(&e, route.via_proxy)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::RateLimited;
        }
        if !status.is_success() {
            return Attempt::Transient(format!("HTTP {}", status.as_u16()));
        }

        match response.json::<serde_json::Value>().await {
            Ok(payload) => Attempt::Success(payload),
            Err(e) => Attempt::Transient(format!("decode failed: {}", e)),
        }
    }
}

fn describe(error: &reqwest::Error, via_proxy: bool) -> String {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    if via_proxy {
        format!("{} (via proxy): {}", kind, error)
    } else {
        format!("{}: {}", kind, error)
    }
}
