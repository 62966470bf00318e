//! Remote collaborators
//!
//! The engine talks to three sources: the catalog itself, per-item details and
//! the market. Each is a trait so the dispatcher can be driven by stand-ins; the
//! [`SteamApi`] type implements all three over HTTP.

mod models;
mod steam;

pub use models::{
    CardBorder, CardFilter, CatalogItem, DetailData, DetailPayload, ItemClass, MarketListing,
    OwnedUsage,
};
pub use steam::SteamApi;

use crate::client::RateLimitedClient;
use crate::Result;
use async_trait::async_trait;

/// Lists the items to crawl
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every item of the public catalog
    async fn fetch_catalog(&self, client: &RateLimitedClient) -> Result<Vec<CatalogItem>>;

    /// Items owned by one account
    async fn fetch_owned_catalog(
        &self,
        client: &RateLimitedClient,
        owner_key: &str,
        owner_id: &str,
    ) -> Result<Vec<CatalogItem>>;
}

/// Fetches the detail record of one item
#[async_trait]
pub trait DetailSource: Send + Sync {
    /// Returns None when the remote answered with no payload for the id
    async fn fetch_detail(
        &self,
        client: &RateLimitedClient,
        id: &str,
    ) -> Result<Option<DetailPayload>>;
}

/// Searches the market for an item's collectibles
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Returns the listings matching `filter`; empty when there are none
    async fn search_market(
        &self,
        client: &RateLimitedClient,
        app_id: &str,
        filter: CardFilter,
    ) -> Result<Vec<MarketListing>>;
}
