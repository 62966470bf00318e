use crate::classify::{
    classify_detail, classify_owned, classify_with_market, Classification, DetailDecision,
};
use crate::client::RateLimitedClient;
use crate::remote::{CardFilter, CatalogItem, DetailSource, MarketSource};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Turns one catalog item into its classification
///
/// Implementations perform the network calls through the worker's client and
/// leave every store write to the dispatcher.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(
        &self,
        client: &RateLimitedClient,
        item: &CatalogItem,
    ) -> Result<Classification>;
}

/// Full pipeline for the public catalog: one detail fetch, then at most one market lookup
#[derive(Clone)]
pub struct CatalogPipeline {
    details: Arc<dyn DetailSource>,
    market: Arc<dyn MarketSource>,
    filter: CardFilter,
}

impl CatalogPipeline {
    pub fn new(details: Arc<dyn DetailSource>, market: Arc<dyn MarketSource>) -> Self {
        Self {
            details,
            market,
            filter: CardFilter::TRADING_CARDS,
        }
    }

    pub fn with_filter(mut self, filter: CardFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[async_trait]
impl ItemProcessor for CatalogPipeline {
    async fn process(
        &self,
        client: &RateLimitedClient,
        item: &CatalogItem,
    ) -> Result<Classification> {
        let detail = self.details.fetch_detail(client, &item.id).await?;

        match classify_detail(item, detail.as_ref()) {
            DetailDecision::Done(classification) => Ok(classification),
            DetailDecision::NeedsMarket(pending) => {
                let listings = self
                    .market
                    .search_market(client, &pending.requested_id, self.filter)
                    .await?;
                Ok(classify_with_market(pending, &listings))
            }
        }
    }
}

/// Market-only pipeline for an account's owned catalog
#[derive(Clone)]
pub struct OwnedPipeline {
    market: Arc<dyn MarketSource>,
    filter: CardFilter,
}

impl OwnedPipeline {
    pub fn new(market: Arc<dyn MarketSource>) -> Self {
        Self {
            market,
            filter: CardFilter::TRADING_CARDS,
        }
    }
}

#[async_trait]
impl ItemProcessor for OwnedPipeline {
    async fn process(
        &self,
        client: &RateLimitedClient,
        item: &CatalogItem,
    ) -> Result<Classification> {
        let listings = self.market.search_market(client, &item.id, self.filter).await?;
        Ok(classify_owned(item, &listings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Bucket;
    use crate::client::{ClientPool, ClientSettings, IdentityPool};
    use crate::remote::{DetailData, DetailPayload, MarketListing};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeRemote {
        details: HashMap<String, DetailPayload>,
        listed: Vec<String>,
        market_calls: AtomicUsize,
    }

    #[async_trait]
    impl DetailSource for FakeRemote {
        async fn fetch_detail(
            &self,
            _client: &RateLimitedClient,
            id: &str,
        ) -> Result<Option<DetailPayload>> {
            Ok(self.details.get(id).cloned())
        }
    }

    #[async_trait]
    impl MarketSource for FakeRemote {
        async fn search_market(
            &self,
            _client: &RateLimitedClient,
            app_id: &str,
            _filter: CardFilter,
        ) -> Result<Vec<MarketListing>> {
            self.market_calls.fetch_add(1, Ordering::SeqCst);
            if !self.listed.iter().any(|id| id == app_id) {
                return Ok(Vec::new());
            }
            Ok(vec![MarketListing {
                app_id: 753,
                name: "Card".to_string(),
                market_hash_name: format!("{}-Card", app_id),
                item_type: "Trading Card".to_string(),
                sell_listings: 1,
                sell_price_text: "$0.03".to_string(),
            }])
        }
    }

    fn client() -> RateLimitedClient {
        ClientPool::new(ClientSettings::default(), Arc::new(IdentityPool::default()))
            .unwrap()
            .lease()
            .unwrap()
    }

    fn game(remote_id: u64) -> DetailPayload {
        DetailPayload {
            success: true,
            data: Some(DetailData {
                steam_appid: remote_id,
                name: "Remote".to_string(),
                kind: "game".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_catalog_pipeline_skips_market_for_unavailable() {
        let remote = Arc::new(FakeRemote::default());
        let pipeline = CatalogPipeline::new(remote.clone(), remote.clone());

        let c = pipeline
            .process(&client(), &CatalogItem::new("10", "A"))
            .await
            .unwrap();

        assert_eq!(c.decision().unwrap().bucket, Bucket::Unavailable);
        assert_eq!(remote.market_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_catalog_pipeline_redirect_uses_requested_id_for_market() {
        let remote = Arc::new(FakeRemote {
            details: HashMap::from([("30".to_string(), game(31))]),
            listed: vec!["30".to_string()],
            ..FakeRemote::default()
        });
        let pipeline = CatalogPipeline::new(remote.clone(), remote.clone());

        let c = pipeline
            .process(&client(), &CatalogItem::new("30", "C"))
            .await
            .unwrap();

        let buckets: Vec<_> = c.records().iter().map(|r| (r.bucket, r.id.as_str())).collect();
        assert_eq!(
            buckets,
            vec![(Bucket::ExcludedRedirect, "30"), (Bucket::Eligible, "31")]
        );
        assert_eq!(remote.market_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_owned_pipeline_uses_market_only() {
        let remote = Arc::new(FakeRemote {
            listed: vec!["70".to_string()],
            ..FakeRemote::default()
        });
        let pipeline = OwnedPipeline::new(remote.clone());
        let client = client();

        let listed = pipeline
            .process(&client, &CatalogItem::new("70", "Owned"))
            .await
            .unwrap();
        let unlisted = pipeline
            .process(&client, &CatalogItem::new("71", "Other"))
            .await
            .unwrap();

        assert_eq!(listed.decision().unwrap().bucket, Bucket::Eligible);
        assert_eq!(unlisted.decision().unwrap().bucket, Bucket::ExcludedNoMarket);
        assert_eq!(
            unlisted.decision().unwrap().item_type.as_deref(),
            Some("game")
        );
    }
}
