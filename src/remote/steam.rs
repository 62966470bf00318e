//! Storefront API wrappers
//!
//! Thin request builders over the configured endpoints. Payload handling:
//!
//! - A JSON `null` or a missing list means "nothing there" (None or empty)
//! - Anything with the wrong shape is a `SiftError::Payload` for that item

use crate::client::RateLimitedClient;
use crate::config::EndpointsConfig;
use crate::remote::models::{RawApp, RawOwnedApp};
use crate::remote::{
    CardFilter, CatalogItem, CatalogSource, DetailPayload, DetailSource, MarketListing,
    MarketSource,
};
use crate::{Result, SiftError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Market category holding trading cards and other community items
const COMMUNITY_MARKET_APP: &str = "753";

/// Listings requested per market search
const MARKET_PAGE_SIZE: u32 = 100;

/// Catalog, detail and market sources backed by the storefront HTTP API
#[derive(Debug, Clone)]
pub struct SteamApi {
    endpoints: EndpointsConfig,
}

impl SteamApi {
    pub fn new(endpoints: EndpointsConfig) -> Self {
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &EndpointsConfig {
        &self.endpoints
    }
}

#[async_trait]
impl CatalogSource for SteamApi {
    async fn fetch_catalog(&self, client: &RateLimitedClient) -> Result<Vec<CatalogItem>> {
        let url = &self.endpoints.all_apps_url;
        let payload = client.get_json(url, &[]).await?;

        let apps: Vec<RawApp> = decode_list(url, payload.pointer("/applist/apps"))?;
        tracing::info!("Catalog lists {} items", apps.len());

        Ok(apps.into_iter().map(CatalogItem::from).collect())
    }

    async fn fetch_owned_catalog(
        &self,
        client: &RateLimitedClient,
        owner_key: &str,
        owner_id: &str,
    ) -> Result<Vec<CatalogItem>> {
        let url = &self.endpoints.owned_apps_url;
        let params = [
            ("key", owner_key.to_string()),
            ("steamid", owner_id.to_string()),
            ("format", "json".to_string()),
            ("include_appinfo", "true".to_string()),
            ("include_played_free_games", "true".to_string()),
        ];
        let payload = client.get_json(url, &params).await?;

        let games: Vec<RawOwnedApp> = decode_list(url, payload.pointer("/response/games"))?;
        tracing::info!("Account {} owns {} items", owner_id, games.len());

        Ok(games.into_iter().map(CatalogItem::from).collect())
    }
}

#[async_trait]
impl DetailSource for SteamApi {
    async fn fetch_detail(
        &self,
        client: &RateLimitedClient,
        id: &str,
    ) -> Result<Option<DetailPayload>> {
        let url = &self.endpoints.app_details_url;
        let payload = client.get_json(url, &[("appids", id.to_string())]).await?;

        match payload.get(id) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(entry) => decode(url, entry.clone()).map(Some),
        }
    }
}

#[async_trait]
impl MarketSource for SteamApi {
    async fn search_market(
        &self,
        client: &RateLimitedClient,
        app_id: &str,
        filter: CardFilter,
    ) -> Result<Vec<MarketListing>> {
        let url = &self.endpoints.market_search_url;
        let mut params = vec![
            ("start", "0".to_string()),
            ("count", MARKET_PAGE_SIZE.to_string()),
            ("norender", "1".to_string()),
            ("appid", COMMUNITY_MARKET_APP.to_string()),
            ("sort_dir", "asc".to_string()),
            ("search_descriptions", "0".to_string()),
            ("category_753_Game[]", format!("tag_app_{}", app_id)),
        ];
        if let Some(item_class) = filter.item_class {
            params.push(("category_753_item_class[]", item_class.tag().to_string()));
        }
        if let Some(border) = filter.border {
            params.push(("category_753_cardborder[]", border.tag().to_string()));
        }

        let payload = client.get_json(url, &params).await?;
        decode_list(url, payload.get("results"))
    }
}

fn decode<T: DeserializeOwned>(url: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| SiftError::Payload {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn decode_list<T: DeserializeOwned>(url: &str, value: Option<&serde_json::Value>) -> Result<Vec<T>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(list) => decode(url, list.clone()),
    }
}
