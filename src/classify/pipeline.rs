//! Short-circuit decision pipeline
//!
//! | Step | Predicate | Outcome |
//! |------|-----------|---------|
//! | 1 | no detail payload | `unavailable` |
//! | 2 | payload marked unsuccessful | `unavailable` (success = false) |
//! | 3 | declared type is not "game" | `excluded-by-type` |
//! | 4 | market lookup has no listings | `excluded-no-market` |
//! | 5 | remote id differs from requested id | `excluded-redirect`, then step 6 on the remote id |
//! | 6 | otherwise | `eligible` |
//!
//! Steps 1-3 only need the detail payload and are decided by [`classify_detail`].
//! Steps 4-6 need the market listings and are decided by [`classify_with_market`].
//! Both are pure; the caller performs the single detail fetch and the single
//! market lookup in between.

use crate::classify::{Bucket, Classification, ClassificationRecord};
use crate::remote::{CatalogItem, DetailPayload, MarketListing};

/// Result of the detail-only part of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum DetailDecision {
    /// A terminal bucket was reached without a market lookup
    Done(Classification),

    /// The item passed steps 1-3; a market lookup for `requested_id` decides the rest
    NeedsMarket(PendingMarket),
}

/// An item waiting for its market lookup
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMarket {
    pub requested_id: String,
    pub remote_id: String,
    pub name: String,
    pub item_type: String,
}

/// Runs steps 1-3
pub fn classify_detail(item: &CatalogItem, detail: Option<&DetailPayload>) -> DetailDecision {
    let Some(detail) = detail else {
        return DetailDecision::Done(Classification::single(ClassificationRecord::new(
            Bucket::Unavailable,
            &item.id,
            &item.name,
        )));
    };

    let data = match (&detail.data, detail.success) {
        (Some(data), true) => data,
        _ => {
            return DetailDecision::Done(Classification::single(
                ClassificationRecord::new(Bucket::Unavailable, &item.id, &item.name)
                    .responded(false),
            ));
        }
    };

    let remote_id = data.steam_appid.to_string();

    if !is_game(&data.kind) {
        return DetailDecision::Done(Classification::single(
            ClassificationRecord::new(Bucket::ExcludedByType, &item.id, &data.name)
                .responded(true)
                .with_type(&data.kind)
                .with_redirect(remote_id),
        ));
    }

    DetailDecision::NeedsMarket(PendingMarket {
        requested_id: item.id.clone(),
        remote_id,
        name: data.name.clone(),
        item_type: data.kind.clone(),
    })
}

/// Runs steps 4-6
pub fn classify_with_market(pending: PendingMarket, listings: &[MarketListing]) -> Classification {
    let PendingMarket {
        requested_id,
        remote_id,
        name,
        item_type,
    } = pending;

    let record = |bucket: Bucket, id: &str| {
        ClassificationRecord::new(bucket, id, &name)
            .responded(true)
            .with_type(&item_type)
            .with_redirect(&remote_id)
    };

    if listings.is_empty() {
        return Classification::single(record(Bucket::ExcludedNoMarket, &requested_id));
    }

    if remote_id != requested_id {
        return Classification::redirected(
            record(Bucket::ExcludedRedirect, &requested_id),
            record(Bucket::Eligible, &remote_id),
        );
    }

    Classification::single(record(Bucket::Eligible, &requested_id))
}

/// Classifies an item from an owned catalog
///
/// Owned items are known games, so only the market check applies.
pub fn classify_owned(item: &CatalogItem, listings: &[MarketListing]) -> Classification {
    let bucket = if listings.is_empty() {
        Bucket::ExcludedNoMarket
    } else {
        Bucket::Eligible
    };

    Classification::single(
        ClassificationRecord::new(bucket, &item.id, &item.name)
            .responded(true)
            .with_type("game"),
    )
}

fn is_game(kind: &str) -> bool {
    kind.eq_ignore_ascii_case("game")
}
