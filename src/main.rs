//! Cardsift main entry point
//!
//! This is the command-line interface for the Cardsift catalog crawler.

use cardsift::client::{load_account, ClientPool, ClientSettings, IdentityPool};
use cardsift::config::{load_config_with_hash, Config};
use cardsift::dispatch::{
    seed_from_reference, CatalogPipeline, DispatchSettings, Dispatcher, ItemProcessor,
    OwnedPipeline, RunStatus,
};
use cardsift::output::{load_statistics, log_run_report, print_statistics};
use cardsift::remote::{CatalogSource, SteamApi};
use cardsift::store::{open_store, Access, SharedStore, Store};
use cardsift::SiftError;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Cardsift: a resumable catalog crawler
///
/// Cardsift walks the storefront catalog (or one account's owned catalog),
/// sorts every item into a bucket and keeps the result in a JSON store that
/// later runs resume from.
#[derive(Parser, Debug)]
#[command(name = "cardsift")]
#[command(version = "1.0.0")]
#[command(about = "A resumable catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl the owned catalog of this account instead of the full catalog
    #[arg(long, value_name = "LOGIN")]
    owned: Option<String>,

    /// Before an owned crawl, copy classifications already in the catalog store
    #[arg(long, requires = "owned")]
    seed_from_catalog: bool,

    /// Route requests through the proxy pool
    #[arg(long)]
    proxy: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the store and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.proxy {
        config.crawler.use_proxy = true;
    }

    let store_path = match &cli.owned {
        Some(login) => config.output.owned_store_path(login),
        None => PathBuf::from(&config.output.store_path),
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &store_path, cli.owned.as_deref());
    } else if cli.stats {
        handle_stats(&store_path)?;
    } else {
        handle_crawl(config, store_path, cli.owned, cli.seed_from_catalog).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("cardsift=info,warn"),
            1 => EnvFilter::new("cardsift=debug,info"),
            2 => EnvFilter::new("cardsift=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, store_path: &Path, owned: Option<&str>) {
    println!("=== Cardsift Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!(
        "  Rate-limit cooldown: {}s",
        config.crawler.rate_limit_cooldown_secs
    );
    println!(
        "  Transient backoff: {}ms",
        config.crawler.transient_backoff_ms
    );
    println!(
        "  Timeouts: read {}s, write {}s",
        config.crawler.read_timeout_secs, config.crawler.write_timeout_secs
    );
    println!("  Proxies: {}", if config.crawler.use_proxy { "on" } else { "off" });
    if config.crawler.cache_buckets.is_empty() {
        println!("  Cache buckets: all");
    } else {
        println!("  Cache buckets: {}", config.crawler.cache_buckets.join(", "));
    }

    println!("\nEndpoints:");
    println!("  Catalog: {}", config.endpoints.all_apps_url);
    println!("  Owned catalog: {}", config.endpoints.owned_apps_url);
    println!("  Details: {}", config.endpoints.app_details_url);
    println!("  Market search: {}", config.endpoints.market_search_url);

    println!("\nIdentity:");
    println!("  User agents: {}", config.identity.user_agents_path);
    if let Some(proxies) = &config.identity.proxies_path {
        println!("  Proxies: {}", proxies);
    }
    if let Some(accounts) = &config.identity.accounts_path {
        println!("  Accounts: {}", accounts);
    }

    println!("\nOutput:");
    println!("  Store: {}", store_path.display());

    println!("\n✓ Configuration is valid");
    match owned {
        Some(login) => println!("✓ Would crawl the owned catalog of {}", login),
        None => println!("✓ Would crawl the full catalog"),
    }
}

/// Handles the --stats mode: shows statistics from the store
fn handle_stats(store_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Store: {}\n", store_path.display());

    let store = Store::open(store_path, Access::ReadOnly)?;
    let stats = load_statistics(&store);
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    store_path: PathBuf,
    owned: Option<String>,
    seed_from_catalog: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let identities = IdentityPool::load(
        Path::new(&config.identity.user_agents_path),
        config.identity.proxies_path.as_deref().map(Path::new),
    )?;
    let clients = ClientPool::new(
        ClientSettings::from_config(&config.crawler),
        Arc::new(identities),
    )?;
    let api = Arc::new(SteamApi::new(config.endpoints.clone()));

    let store = SharedStore::new(open_store(&store_path)?);
    tracing::info!(
        "Store {} holds {} classified items",
        store_path.display(),
        store.lock().record_count()
    );

    let catalog_client = clients.lease()?;
    let (items, processor) = match &owned {
        Some(login) => {
            let accounts_path = config.identity.accounts_path.as_deref().ok_or_else(|| {
                SiftError::AccountNotFound(format!("{} (no accounts-path configured)", login))
            })?;
            let account = load_account(Path::new(accounts_path), login)?;
            let items = api
                .fetch_owned_catalog(&catalog_client, &account.api_key, &account.steam_id)
                .await?;
            let processor: Arc<dyn ItemProcessor> = Arc::new(OwnedPipeline::new(api.clone()));
            (items, processor)
        }
        None => {
            let items = api.fetch_catalog(&catalog_client).await?;
            let processor: Arc<dyn ItemProcessor> =
                Arc::new(CatalogPipeline::new(api.clone(), api.clone()));
            (items, processor)
        }
    };

    if seed_from_catalog {
        let catalog_path = Path::new(&config.output.store_path);
        if catalog_path.exists() {
            let reference = Store::open(catalog_path, Access::ReadOnly)?;
            seed_from_reference(&reference, &store, &items, &config.crawler.cache_buckets)?;
        } else {
            tracing::warn!(
                "Catalog store {} does not exist, nothing to seed from",
                catalog_path.display()
            );
        }
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received interrupt, stopping workers");
            shutdown.cancel();
        }
    });

    let dispatcher = Dispatcher::new(DispatchSettings::from_config(&config.crawler), clients);
    match dispatcher.run(items, store, processor, cancel).await {
        Ok(report) => {
            log_run_report(&report, dispatcher.clients().stats());
            if report.status == RunStatus::Interrupted {
                tracing::info!("Run interrupted; the next run resumes from {}", store_path.display());
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run {}: {}", RunStatus::Failed, e);
            Err(e.into())
        }
    }
}
