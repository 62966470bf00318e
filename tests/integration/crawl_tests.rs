//! Integration tests for the crawl engine
//!
//! These tests use wiremock to stand in for the storefront API and run the
//! whole fetch, classify and persist cycle end-to-end.

use cardsift::client::{ClientPool, ClientSettings, IdentityPool};
use cardsift::config::EndpointsConfig;
use cardsift::dispatch::{CatalogPipeline, DispatchSettings, Dispatcher, RunStatus};
use cardsift::remote::{CatalogItem, CatalogSource, SteamApi};
use cardsift::store::{open_store, Access, SharedStore, Store};
use cardsift::{Bucket, ClassificationRecord};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoints(server: &MockServer) -> EndpointsConfig {
    EndpointsConfig {
        all_apps_url: format!("{}/ISteamApps/GetAppList/v2", server.uri()),
        owned_apps_url: format!("{}/IPlayerService/GetOwnedGames/v1", server.uri()),
        app_details_url: format!("{}/api/appdetails", server.uri()),
        market_search_url: format!("{}/market/search/render", server.uri()),
    }
}

fn client_pool() -> ClientPool {
    let settings = ClientSettings {
        rate_limit_cooldown: Duration::from_millis(100),
        transient_backoff: Duration::from_millis(10),
        read_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        use_proxy: false,
    };
    ClientPool::new(settings, Arc::new(IdentityPool::default())).unwrap()
}

fn dispatcher(workers: usize, cache_buckets: &[&str]) -> Dispatcher {
    Dispatcher::new(
        DispatchSettings {
            workers,
            cache_buckets: cache_buckets.iter().map(|b| b.to_string()).collect(),
        },
        client_pool(),
    )
}

fn pipeline(api: &Arc<SteamApi>) -> Arc<CatalogPipeline> {
    Arc::new(CatalogPipeline::new(api.clone(), api.clone()))
}

async fn mount_detail(server: &MockServer, id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .and(query_param("appids", id))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_game(server: &MockServer, id: &str, remote_id: u64, name: &str) {
    let mut body = serde_json::Map::new();
    body.insert(
        id.to_string(),
        json!({"success": true, "data": {"steam_appid": remote_id, "name": name, "type": "game"}}),
    );
    mount_detail(server, id, serde_json::Value::Object(body)).await;
}

async fn mount_market(server: &MockServer, app_id: &str, listings: usize) {
    let results: Vec<_> = (0..listings)
        .map(|i| {
            json!({
                "sell_listings": 5,
                "sell_price_text": "$0.07",
                "asset_description": {
                    "appid": 753,
                    "name": format!("Card {}", i),
                    "market_hash_name": format!("{}-Card {}", app_id, i),
                    "type": "Trading Card"
                }
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/market/search/render"))
        .and(query_param("category_753_Game[]", format!("tag_app_{}", app_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "results": results})))
        .mount(server)
        .await;
}

async fn detail_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/api/appdetails")
        .count()
}

fn reopen(path: &Path) -> Store {
    Store::open(path, Access::ReadOnly).unwrap()
}

fn record(store: &Store, bucket: Bucket, id: &str) -> Option<ClassificationRecord> {
    store
        .records()
        .into_iter()
        .find(|r| r.bucket == bucket && r.id == id)
}

#[tokio::test]
async fn test_two_item_catalog_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("all_apps.json");

    Mock::given(method("GET"))
        .and(path("/ISteamApps/GetAppList/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "applist": {"apps": [{"appid": 10, "name": "A"}, {"appid": 20, "name": "B"}]}
        })))
        .mount(&server)
        .await;
    mount_detail(&server, "10", json!(null)).await;
    mount_game(&server, "20", 20, "B").await;
    mount_market(&server, "20", 1).await;

    let api = Arc::new(SteamApi::new(endpoints(&server)));
    let dispatcher = dispatcher(2, &[]);
    let items = api
        .fetch_catalog(&dispatcher.clients().lease().unwrap())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    let store = SharedStore::new(open_store(&store_path).unwrap());
    let report = dispatcher
        .run(items, store, pipeline(&api), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.processed, 2);

    let on_disk = reopen(&store_path);
    let unavailable = record(&on_disk, Bucket::Unavailable, "10").unwrap();
    assert!(!unavailable.response_received);
    assert!(!unavailable.success);

    let eligible = record(&on_disk, Bucket::Eligible, "20").unwrap();
    assert!(eligible.success);
    assert_eq!(eligible.redirect_id.as_deref(), Some("20"));
    assert_eq!(eligible.item_type.as_deref(), Some("game"));
    assert_eq!(on_disk.record_count(), 2);
}

#[tokio::test]
async fn test_resume_skips_classified_items() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("all_apps.json");

    mount_detail(&server, "10", json!(null)).await;
    mount_game(&server, "20", 20, "B").await;
    mount_market(&server, "20", 2).await;

    let api = Arc::new(SteamApi::new(endpoints(&server)));
    let items = vec![CatalogItem::new("10", "A"), CatalogItem::new("20", "B")];

    let first = dispatcher(2, &[])
        .run(
            items.clone(),
            SharedStore::new(open_store(&store_path).unwrap()),
            pipeline(&api),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(detail_requests(&server).await, 2);

    let second = dispatcher(2, &[])
        .run(
            items,
            SharedStore::new(open_store(&store_path).unwrap()),
            pipeline(&api),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(second.skipped, 2);
    assert_eq!(second.processed, 0);
    assert_eq!(detail_requests(&server).await, 2);
}

#[tokio::test]
async fn test_reclassification_moves_item_between_buckets() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("all_apps.json");

    {
        let mut store = open_store(&store_path).unwrap();
        store
            .displace_object("20", &ClassificationRecord::new(Bucket::Unavailable, "20", "B"))
            .unwrap();
        store.flush().unwrap();
    }

    mount_game(&server, "20", 20, "B").await;
    mount_market(&server, "20", 0).await;

    let api = Arc::new(SteamApi::new(endpoints(&server)));
    // Only a final bucket counts as cached, so the stale entry is retried
    let report = dispatcher(1, &["eligible", "excluded-no-market"])
        .run(
            vec![CatalogItem::new("20", "B")],
            SharedStore::new(open_store(&store_path).unwrap()),
            pipeline(&api),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.processed, 1);

    let on_disk = reopen(&store_path);
    assert!(record(&on_disk, Bucket::Unavailable, "20").is_none());
    assert!(record(&on_disk, Bucket::ExcludedNoMarket, "20").is_some());
    assert_eq!(on_disk.bucket_len("unavailable"), 0);
    assert_eq!(on_disk.record_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_redirect_and_type_exclusion() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("all_apps.json");

    mount_game(&server, "30", 31, "C").await;
    mount_market(&server, "30", 1).await;
    mount_detail(
        &server,
        "40",
        json!({"40": {"success": true, "data": {"steam_appid": 40, "name": "D OST", "type": "DLC"}}}),
    )
    .await;
    mount_detail(&server, "50", json!({"50": {"success": false}})).await;

    let api = Arc::new(SteamApi::new(endpoints(&server)));
    let report = dispatcher(3, &[])
        .run(
            vec![
                CatalogItem::new("30", "C"),
                CatalogItem::new("40", "D"),
                CatalogItem::new("50", "E"),
            ],
            SharedStore::new(open_store(&store_path).unwrap()),
            pipeline(&api),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.processed, 3);

    let on_disk = reopen(&store_path);
    let redirected = record(&on_disk, Bucket::ExcludedRedirect, "30").unwrap();
    assert_eq!(redirected.redirect_id.as_deref(), Some("31"));
    assert!(record(&on_disk, Bucket::Eligible, "31").is_some());

    let excluded = record(&on_disk, Bucket::ExcludedByType, "40").unwrap();
    assert_eq!(excluded.item_type.as_deref(), Some("DLC"));

    let failed = record(&on_disk, Bucket::Unavailable, "50").unwrap();
    assert!(failed.response_received);
    assert!(!failed.success);
}

#[tokio::test]
async fn test_rate_limited_detail_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("all_apps.json");

    Mock::given(method("GET"))
        .and(path("/api/appdetails"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_detail(&server, "10", json!(null)).await;

    let api = Arc::new(SteamApi::new(endpoints(&server)));
    let dispatcher = dispatcher(1, &[]);
    let report = dispatcher
        .run(
            vec![CatalogItem::new("10", "A")],
            SharedStore::new(open_store(&store_path).unwrap()),
            pipeline(&api),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(dispatcher.clients().stats().rate_limited, 1);
    assert!(record(&reopen(&store_path), Bucket::Unavailable, "10").is_some());
}

#[tokio::test]
async fn test_cancel_flushes_completed_work() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("all_apps.json");

    mount_detail(&server, "10", json!(null)).await;
    mount_game(&server, "20", 20, "B").await;
    Mock::given(method("GET"))
        .and(path("/market/search/render"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": []}))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let api = Arc::new(SteamApi::new(endpoints(&server)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        dispatcher(2, &[]).run(
            vec![CatalogItem::new("10", "A"), CatalogItem::new("20", "B")],
            SharedStore::new(open_store(&store_path).unwrap()),
            pipeline(&api),
            cancel,
        ),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.status, RunStatus::Interrupted);
    assert_eq!(report.processed, 1);

    let on_disk = reopen(&store_path);
    assert!(record(&on_disk, Bucket::Unavailable, "10").is_some());
    assert!(!on_disk.contains::<&str>("20", None));
}
