use crate::classify::{Bucket, ClassificationRecord};
use crate::remote::CatalogItem;
use crate::store::{SharedStore, Store};
use crate::Result;

/// Copies classifications already known to `reference` into `target`
///
/// Used before an owned-catalog crawl: items the full-catalog store has already
/// classified don't need another round trip. Only `buckets` are consulted (every
/// bucket when empty). The target is flushed once at the end.
///
/// # Arguments
///
/// * `reference` - Store to copy from, usually opened read-only
/// * `target` - Store to copy into
/// * `items` - Catalog whose ids are looked up in `reference`
/// * `buckets` - Buckets of `reference` that count as known
///
/// # Returns
///
/// * `Ok(usize)` - Number of items copied
/// * `Err(SiftError)` - Writing or flushing the target failed
pub fn seed_from_reference(
    reference: &Store,
    target: &SharedStore,
    items: &[CatalogItem],
    buckets: &[String],
) -> Result<usize> {
    let buckets: Vec<&str> = if buckets.is_empty() {
        Bucket::ALL.iter().map(Bucket::store_key).collect()
    } else {
        buckets.iter().map(String::as_str).collect()
    };

    let mut seeded = 0;
    {
        let mut store = target.lock();
        for item in items {
            let Some(hit) = reference.is_cached(&item.id, Some(buckets.as_slice())) else {
                continue;
            };
            let Some(bucket) = hit.bucket.as_deref().and_then(Bucket::from_store_key) else {
                continue;
            };
            let Some(record) = ClassificationRecord::from_fields(bucket, &item.id, hit.value)
            else {
                tracing::debug!("Reference entry for {} has no record shape, skipping", item.id);
                continue;
            };

            store.displace_object(&item.id, &record)?;
            seeded += 1;

            tracing::info!(
                "Item {} (redirect {}) -> {} [seeded from {}]",
                item.id,
                record.redirect_id.as_deref().unwrap_or("-"),
                record.bucket,
                reference.path().display()
            );
        }
        store.flush()?;
    }

    tracing::info!("Seeded {} of {} items from reference store", seeded, items.len());
    Ok(seeded)
}
