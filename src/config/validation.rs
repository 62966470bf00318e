use crate::classify::Bucket;
use crate::config::types::{Config, CrawlerConfig, EndpointsConfig, IdentityConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_endpoints(&config.endpoints)?;
    validate_identity_config(&config.identity)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates worker and retry settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.read_timeout_secs == 0 || config.write_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "read and write timeouts must be > 0".to_string(),
        ));
    }

    for name in &config.cache_buckets {
        if Bucket::from_store_key(name).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown bucket '{}' in cache_buckets",
                name
            )));
        }
    }

    Ok(())
}

/// Validates remote endpoints
fn validate_endpoints(config: &EndpointsConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("all_apps_url", &config.all_apps_url),
        ("owned_apps_url", &config.owned_apps_url),
        ("app_details_url", &config.app_details_url),
        ("market_search_url", &config.market_search_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates identity sources
fn validate_identity_config(config: &IdentityConfig) -> Result<(), ConfigError> {
    if config.user_agents_path.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents_path cannot be empty".to_string(),
        ));
    }

    if matches!(config.proxies_path.as_deref(), Some("")) {
        return Err(ConfigError::Validation(
            "proxies_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.store_path.is_empty() {
        return Err(ConfigError::Validation(
            "store_path cannot be empty".to_string(),
        ));
    }

    if config.owned_store_dir.is_empty() {
        return Err(ConfigError::Validation(
            "owned_store_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crawler() -> CrawlerConfig {
        CrawlerConfig {
            workers: 8,
            rate_limit_cooldown_secs: 30,
            transient_backoff_ms: 1000,
            read_timeout_secs: 10,
            write_timeout_secs: 15,
            use_proxy: false,
            cache_buckets: vec![],
        }
    }

    fn endpoints(base: &str) -> EndpointsConfig {
        EndpointsConfig {
            all_apps_url: format!("{}/apps", base),
            owned_apps_url: format!("{}/owned", base),
            app_details_url: format!("{}/details", base),
            market_search_url: format!("{}/market", base),
        }
    }

    #[test]
    fn test_validate_workers_range() {
        assert!(validate_crawler_config(&crawler()).is_ok());

        let mut config = crawler();
        config.workers = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.workers = 1000;
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_validate_cache_buckets() {
        let mut config = crawler();
        config.cache_buckets = vec!["eligible".to_string(), "unavailable".to_string()];
        assert!(validate_crawler_config(&config).is_ok());

        config.cache_buckets.push("whitelist".to_string());
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_validate_endpoints() {
        assert!(validate_endpoints(&endpoints("https://api.example.com")).is_ok());
        assert!(validate_endpoints(&endpoints("http://127.0.0.1:8080")).is_ok());
        assert!(validate_endpoints(&endpoints("ftp://example.com")).is_err());
        assert!(validate_endpoints(&endpoints("not a url")).is_err());
    }

    #[test]
    fn test_validate_identity() {
        let mut config = IdentityConfig {
            user_agents_path: "ua.json".to_string(),
            proxies_path: None,
            accounts_path: None,
        };
        assert!(validate_identity_config(&config).is_ok());

        config.proxies_path = Some(String::new());
        assert!(validate_identity_config(&config).is_err());

        config.proxies_path = None;
        config.user_agents_path = String::new();
        assert!(validate_identity_config(&config).is_err());
    }
}
