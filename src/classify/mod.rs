//! Classification of catalog items
//!
//! This module contains:
//! - The bucket definitions an item can end up in
//! - The persisted classification record
//! - The short-circuit decision pipeline that produces records

mod pipeline;

pub use pipeline::{
    classify_detail, classify_owned, classify_with_market, DetailDecision, PendingMarket,
};

use crate::store::Value;
use crate::StoreResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A mutually exclusive classification outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Details could not be fetched or the remote reported failure
    Unavailable,

    /// The item is not a game
    ExcludedByType,

    /// The market has no listings for the item
    ExcludedNoMarket,

    /// The requested id resolves to a different item
    ExcludedRedirect,

    /// The item passed every check
    Eligible,
}

impl Bucket {
    /// Every bucket, in pipeline order
    pub const ALL: [Bucket; 5] = [
        Bucket::Unavailable,
        Bucket::ExcludedByType,
        Bucket::ExcludedNoMarket,
        Bucket::ExcludedRedirect,
        Bucket::Eligible,
    ];

    /// Top-level key of this bucket in the store document
    pub fn store_key(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::ExcludedByType => "excluded-by-type",
            Self::ExcludedNoMarket => "excluded-no-market",
            Self::ExcludedRedirect => "excluded-redirect",
            Self::Eligible => "eligible",
        }
    }

    /// Parses a bucket from its store key
    pub fn from_store_key(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bucket| bucket.store_key() == s)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.store_key())
    }
}

/// The persisted outcome of classifying one item
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRecord {
    pub bucket: Bucket,
    pub id: String,
    pub name: String,
    pub response_received: bool,
    pub success: bool,
    pub redirect_id: Option<String>,
    pub item_type: Option<String>,
    pub timestamp: NaiveDate,
}

/// On-disk fields of a record (everything except bucket and id, which are keys)
#[derive(Debug, Serialize, Deserialize)]
struct RecordFields {
    name: String,
    response_received: bool,
    success: bool,
    redirect_id: Option<String>,
    item_type: Option<String>,
    timestamp: NaiveDate,
}

impl ClassificationRecord {
    /// Creates a record stamped with today's date
    pub fn new(bucket: Bucket, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket,
            id: id.into(),
            name: name.into(),
            response_received: false,
            success: false,
            redirect_id: None,
            item_type: None,
            timestamp: chrono::Local::now().date_naive(),
        }
    }

    pub fn responded(mut self, success: bool) -> Self {
        self.response_received = true;
        self.success = success;
        self
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn with_redirect(mut self, redirect_id: impl Into<String>) -> Self {
        self.redirect_id = Some(redirect_id.into());
        self
    }

    /// The record's field mapping, without the bucket/id wrapping
    pub fn fields(&self) -> StoreResult<Value> {
        let fields = RecordFields {
            name: self.name.clone(),
            response_received: self.response_received,
            success: self.success,
            redirect_id: self.redirect_id.clone(),
            item_type: self.item_type.clone(),
            timestamp: self.timestamp,
        };
        Ok(Value::from(serde_json::to_value(fields)?))
    }

    /// The `{bucket: {id: fields}}` shape merged into the store
    pub fn to_tree(&self) -> StoreResult<Value> {
        self.tree_keyed_by(&self.id)
    }

    /// Same as [`ClassificationRecord::to_tree`] with an explicit id key
    pub fn tree_keyed_by(&self, id: &str) -> StoreResult<Value> {
        let by_id = BTreeMap::from([(id.to_string(), self.fields()?)]);
        Ok(Value::Node(BTreeMap::from([(
            self.bucket.store_key().to_string(),
            Value::Node(by_id),
        )])))
    }

    /// Rebuilds a record from a stored entry
    ///
    /// Returns None when the fields do not have the record shape.
    pub fn from_fields(bucket: Bucket, id: &str, fields: &Value) -> Option<Self> {
        let fields: RecordFields = serde_json::from_value(serde_json::Value::from(fields)).ok()?;
        Some(Self {
            bucket,
            id: id.to_string(),
            name: fields.name,
            response_received: fields.response_received,
            success: fields.success,
            redirect_id: fields.redirect_id,
            item_type: fields.item_type,
            timestamp: fields.timestamp,
        })
    }
}

/// The records produced for one catalog item
///
/// Usually a single record; a redirected item yields the excluded record for the
/// requested id plus the eligible record for the id it redirects to.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    records: Vec<ClassificationRecord>,
}

impl Classification {
    pub fn single(record: ClassificationRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    pub fn redirected(excluded: ClassificationRecord, target: ClassificationRecord) -> Self {
        Self {
            records: vec![excluded, target],
        }
    }

    /// Records in the order they must be written
    pub fn records(&self) -> &[ClassificationRecord] {
        &self.records
    }

    /// The last record written, which is the final decision for the item
    pub fn decision(&self) -> Option<&ClassificationRecord> {
        self.records.last()
    }
}
