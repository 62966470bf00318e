//! Identity pools
//!
//! User agents and proxies are loaded once, read-only, from JSON documents:
//!
//! ```json
//! {"user-agents": ["Mozilla/5.0 ...", "..."]}
//! {"proxies": [{"host": "10.0.0.1:3128"}, {"host": "10.0.0.2:3128", "login": "u", "password": "p"}]}
//! ```

use crate::store::{Access, Store, Value};
use crate::{SiftError, StoreError};
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::path::Path;

const DEFAULT_USER_AGENT: &str = concat!("cardsift/", env!("CARGO_PKG_VERSION"));

/// A proxy endpoint, credentialed or anonymous
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyDescriptor {
    pub host: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyDescriptor {
    /// Proxy URL, with credentials only when both login and password are present
    pub fn to_url(&self) -> String {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => {
                format!("http://{}:{}@{}", login, password, self.host)
            }
            _ => format!("http://{}", self.host),
        }
    }
}

/// User agents and proxies to rotate through
#[derive(Debug, Clone, Default)]
pub struct IdentityPool {
    user_agents: Vec<String>,
    proxies: Vec<ProxyDescriptor>,
}

impl IdentityPool {
    pub fn new(user_agents: Vec<String>, proxies: Vec<ProxyDescriptor>) -> Self {
        Self {
            user_agents,
            proxies,
        }
    }

    /// Loads the pools from their documents
    ///
    /// # Errors
    ///
    /// * `SiftError::Store` - A document is missing or malformed
    /// * `SiftError::InvalidProxy` - A proxy entry has the wrong shape
    pub fn load(user_agents_path: &Path, proxies_path: Option<&Path>) -> Result<Self, SiftError> {
        let store = Store::open(user_agents_path, Access::ReadOnly)?;
        let user_agents: Vec<String> = decode_list(&store, "user-agents")
            .map_err(|e| SiftError::Store(StoreError::Serialization(e)))?;

        let proxies = match proxies_path {
            Some(path) => {
                let store = Store::open(path, Access::ReadOnly)?;
                decode_list(&store, "proxies").map_err(|e| SiftError::InvalidProxy(e.to_string()))?
            }
            None => Vec::new(),
        };

        tracing::info!(
            "Loaded {} user agents and {} proxies",
            user_agents.len(),
            proxies.len()
        );

        Ok(Self::new(user_agents, proxies))
    }

    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }

    pub fn proxies(&self) -> &[ProxyDescriptor] {
        &self.proxies
    }

    /// A user agent chosen uniformly at random
    pub fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENT)
    }
}

/// Credentials of an account whose owned catalog can be crawled
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub api_key: String,
    pub steam_id: String,
}

/// Looks up an account in a `{login: {api_key, steam_id}}` document
pub fn load_account(accounts_path: &Path, login: &str) -> Result<Account, SiftError> {
    let store = Store::open(accounts_path, Access::ReadOnly)?;
    let entry = store.get_strict(login).map_err(|e| match e {
        StoreError::ItemNotFound(_) => SiftError::AccountNotFound(login.to_string()),
        other => SiftError::Store(other),
    })?;

    serde_json::from_value(serde_json::Value::from(entry))
        .map_err(|e| SiftError::Store(StoreError::Serialization(e)))
}

fn decode_list<T: serde::de::DeserializeOwned>(
    store: &Store,
    key: &str,
) -> Result<Vec<T>, serde_json::Error> {
    let list = store.get_or(key, Value::List(Vec::new()));
    serde_json::from_value(serde_json::Value::from(&list))
}
