use serde::Deserialize;

/// Main configuration structure for Cardsift
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub endpoints: EndpointsConfig,
    pub identity: IdentityConfig,
    pub output: OutputConfig,
}

/// Worker pool and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent workers (items in flight)
    pub workers: u32,

    /// Sleep after a rate-limit response before retrying (seconds)
    pub rate_limit_cooldown_secs: u64,

    /// Sleep after a transient failure before retrying (milliseconds)
    #[serde(default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,

    /// Per-call timeout for reads (seconds)
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Per-call timeout for writes (seconds)
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,

    /// Route requests through the proxy pool
    #[serde(default)]
    pub use_proxy: bool,

    /// Buckets consulted when deciding whether an item was already classified.
    /// Empty means every bucket.
    #[serde(default)]
    pub cache_buckets: Vec<String>,
}

/// Remote endpoints of the catalog API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EndpointsConfig {
    pub all_apps_url: String,
    pub owned_apps_url: String,
    pub app_details_url: String,
    pub market_search_url: String,
}

/// Identity pool and account sources
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IdentityConfig {
    /// JSON document with a `user-agents` list
    pub user_agents_path: String,

    /// JSON document with a `proxies` list
    #[serde(default)]
    pub proxies_path: Option<String>,

    /// JSON document mapping login -> {api_key, steam_id}
    #[serde(default)]
    pub accounts_path: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Store for the full catalog crawl
    pub store_path: String,

    /// Directory holding one store per account for owned crawls
    pub owned_store_dir: String,
}

impl OutputConfig {
    /// Path of the owned-catalog store for the given login
    pub fn owned_store_path(&self, login: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.owned_store_dir).join(format!("{}_apps.json", login))
    }
}

fn default_transient_backoff_ms() -> u64 {
    1000
}

fn default_read_timeout_secs() -> u64 {
    10
}

fn default_write_timeout_secs() -> u64 {
    15
}
