//! Statistics generation from a classification store
//!
//! This module provides functionality for summarizing a store and the outcome
//! of a single run.

use crate::classify::Bucket;
use crate::client::RetryStats;
use crate::dispatch::RunReport;
use crate::store::Store;
use std::collections::HashMap;

/// Store statistics summary
#[derive(Debug, Clone, Default)]
pub struct StoreStatistics {
    /// Total number of classified items
    pub total_records: u64,

    /// Count of items by bucket
    pub records_by_bucket: HashMap<Bucket, u64>,

    /// Items whose detail lookup got no response at all
    pub without_response: u64,

    /// Items whose requested id resolved to another id
    pub redirected: u64,

    /// Top-level keys that are not buckets
    pub unknown_keys: Vec<String>,
}

impl StoreStatistics {
    pub fn count(&self, bucket: Bucket) -> u64 {
        self.records_by_bucket.get(&bucket).copied().unwrap_or(0)
    }
}

/// Loads statistics from a store
pub fn load_statistics(store: &Store) -> StoreStatistics {
    let mut stats = StoreStatistics::default();

    for record in store.records() {
        stats.total_records += 1;
        *stats.records_by_bucket.entry(record.bucket).or_insert(0) += 1;

        if !record.response_received {
            stats.without_response += 1;
        }
        if record
            .redirect_id
            .as_deref()
            .is_some_and(|redirect| redirect != record.id)
        {
            stats.redirected += 1;
        }
    }

    stats.unknown_keys = store
        .buckets()
        .filter(|(name, _)| Bucket::from_store_key(name).is_none())
        .map(|(name, _)| name.to_string())
        .collect();

    stats
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");

    println!("Overview:");
    println!("  Classified items: {}", stats.total_records);
    println!("  No response: {}", stats.without_response);
    println!("  Redirected: {}", stats.redirected);
    println!();

    println!("Items by Bucket:");
    for bucket in Bucket::ALL {
        let count = stats.count(bucket);
        let percentage = if stats.total_records > 0 {
            (count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", bucket, count, percentage);
    }
    println!();

    if !stats.unknown_keys.is_empty() {
        println!("Unrecognized top-level keys ({}):", stats.unknown_keys.len());
        for key in &stats.unknown_keys {
            println!("  - {}", key);
        }
        println!();
    }
}

/// Logs the outcome of a run
pub fn log_run_report(report: &RunReport, retries: RetryStats) {
    tracing::info!(
        "Run {}: {} of {} items processed, {} skipped, {} failed",
        report.status,
        report.processed,
        report.total,
        report.skipped,
        report.failed
    );
    tracing::info!(
        "Retries: {} rate limited, {} transient",
        retries.rate_limited,
        retries.transient
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassificationRecord;
    use crate::store::{open_store, Value};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_load_statistics() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir.path().join("apps.json")).unwrap();

        store
            .displace_object("10", &ClassificationRecord::new(Bucket::Unavailable, "10", "A"))
            .unwrap();
        store
            .displace_object(
                "30",
                &ClassificationRecord::new(Bucket::ExcludedRedirect, "30", "C")
                    .responded(true)
                    .with_redirect("31"),
            )
            .unwrap();
        store
            .displace_object(
                "31",
                &ClassificationRecord::new(Bucket::Eligible, "31", "C")
                    .responded(true)
                    .with_redirect("31"),
            )
            .unwrap();
        store
            .save(Value::Node(BTreeMap::from([(
                "legacy".to_string(),
                Value::empty_node(),
            )])))
            .unwrap();

        let stats = load_statistics(&store);

        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.count(Bucket::Eligible), 1);
        assert_eq!(stats.count(Bucket::ExcludedByType), 0);
        assert_eq!(stats.without_response, 1);
        assert_eq!(stats.redirected, 1);
        assert_eq!(stats.unknown_keys, vec!["legacy".to_string()]);
    }
}
