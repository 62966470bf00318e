//! File-backed JSON document store
//!
//! The whole document is loaded at open time and rewritten in place on every
//! flush. The store does no locking of its own; see [`crate::store::SharedStore`]
//! for the handle the worker pool uses.

use crate::classify::{Bucket, ClassificationRecord};
use crate::store::Value;
use crate::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// How a store file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// A match returned by [`Store::is_cached`]
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<'a> {
    /// Bucket the key was found under, when buckets were given
    pub bucket: Option<String>,

    /// The value stored under the key
    pub value: &'a Value,
}

/// File-backed tree of `bucket -> id -> fields`
pub struct Store {
    path: PathBuf,
    access: Access,
    file: File,
    data: Value,
}

impl Store {
    /// Opens a store file and loads its document
    ///
    /// A read-write open of a missing file creates it with an empty document.
    /// A read-only open of a missing file fails with an I/O error.
    ///
    /// # Arguments
    ///
    /// * `path` - The JSON document backing the store
    /// * `access` - `ReadOnly` for auxiliary documents, `ReadWrite` for crawl output
    ///
    /// # Returns
    ///
    /// * `Ok(Store)` - The loaded store; its tree mirrors the file
    /// * `Err(StoreError)` - The file could not be opened or parsed
    ///
    /// # Errors
    ///
    /// * `StoreError::MalformedDocument` - The file is not a JSON object
    /// * `StoreError::Io` - The file could not be opened or read
    pub fn open(path: impl AsRef<Path>, access: Access) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();

        let mut file = match access {
            Access::ReadOnly => OpenOptions::new().read(true).open(&path)?,
            Access::ReadWrite => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&path)?
            }
        };

        if !existed {
            let mut store = Self {
                path,
                access,
                file,
                data: Value::empty_node(),
            };
            tracing::info!("Created empty store at {}", store.path.display());
            store.flush()?;
            return Ok(store);
        }

        let mut content = String::new();
        file.read_to_string(&mut content)?;
        let data = parse_document(&path, &content)?;

        tracing::debug!(
            "Opened store {} ({} top-level keys)",
            path.display(),
            data.len()
        );

        Ok(Self {
            path,
            access,
            file,
            data,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.access == Access::ReadOnly
    }

    /// The whole document
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Top-level lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.child(key)
    }

    /// Top-level lookup falling back to `default`
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }

    /// Top-level lookup that fails on a missing key
    pub fn get_strict(&self, key: &str) -> StoreResult<&Value> {
        self.get(key)
            .ok_or_else(|| StoreError::ItemNotFound(key.to_string()))
    }

    /// Top-level lookup of several keys, None for each missing one
    pub fn get_many<S: AsRef<str>>(&self, keys: &[S]) -> Vec<Option<&Value>> {
        keys.iter().map(|key| self.get(key.as_ref())).collect()
    }

    /// Searches for `key` to decide whether an item was already classified
    ///
    /// With `buckets`, each bucket is located by a deep search for its name and
    /// then searched for `key`; buckets are tried in the given order and the first
    /// hit wins. Without `buckets`, the whole tree is searched.
    pub fn is_cached<S: AsRef<str>>(&self, key: &str, buckets: Option<&[S]>) -> Option<CacheHit<'_>> {
        match buckets {
            Some(buckets) => buckets.iter().find_map(|bucket| {
                let bucket = bucket.as_ref();
                self.data
                    .find(bucket)
                    .and_then(|node| node.find(key))
                    .map(|value| CacheHit {
                        bucket: Some(bucket.to_string()),
                        value,
                    })
            }),
            None => self.data.find(key).map(|value| CacheHit {
                bucket: None,
                value,
            }),
        }
    }

    /// Boolean form of [`Store::is_cached`]
    pub fn contains<S: AsRef<str>>(&self, key: &str, buckets: Option<&[S]>) -> bool {
        self.is_cached(key, buckets).is_some()
    }

    /// Moves `id` to the record's bucket
    ///
    /// Deletes the first occurrence of `id` anywhere in the tree, then merges the
    /// record's `{bucket: {id: fields}}` shape. Only touches memory; call
    /// [`Store::flush`] to persist.
    pub fn displace_object(&mut self, id: &str, record: &ClassificationRecord) -> StoreResult<()> {
        let tree = record.tree_keyed_by(id)?;

        if let Some(previous) = self.data.remove_first(id) {
            tracing::trace!("Displacing {} (previous entry: {:?})", id, previous);
        }
        self.data.merge(tree);
        Ok(())
    }

    /// Removes a top-level key and flushes
    pub fn delete(&mut self, key: &str) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::NotWritable(self.path.display().to_string()));
        }

        let removed = self
            .data
            .as_node_mut()
            .and_then(|map| map.remove(key));

        if removed.is_none() {
            return Err(StoreError::ItemNotFound(key.to_string()));
        }

        self.flush()
    }

    /// Deep-merges `tree` into the document and flushes
    pub fn save(&mut self, tree: Value) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::NotWritable(self.path.display().to_string()));
        }

        self.data.merge(tree);
        self.flush()
    }

    /// Writes the whole document over the backing file
    ///
    /// Overwrites from offset zero and truncates whatever the previous, longer
    /// document left behind.
    pub fn flush(&mut self) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::NotWritable(self.path.display().to_string()));
        }

        let bytes = serde_json::to_vec_pretty(&serde_json::Value::from(&self.data))?;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&bytes)?;
        self.file.set_len(bytes.len() as u64)?;
        self.file.sync_data()?;

        tracing::debug!(
            "Flushed {} records to {}",
            self.record_count(),
            self.path.display()
        );

        Ok(())
    }

    /// Top-level entries (bucket name, bucket node)
    pub fn buckets(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data
            .as_node()
            .into_iter()
            .flat_map(BTreeMap::iter)
            .map(|(name, node)| (name.as_str(), node))
    }

    /// Number of entries in a bucket, zero if absent
    pub fn bucket_len(&self, bucket: &str) -> usize {
        self.get(bucket).map(Value::len).unwrap_or(0)
    }

    /// Total number of entries across all top-level keys
    pub fn record_count(&self) -> usize {
        self.buckets().map(|(_, node)| node.len()).sum()
    }

    /// Decodes every entry under a known bucket into a record
    ///
    /// Unknown top-level keys and entries without the record shape are skipped.
    pub fn records(&self) -> Vec<ClassificationRecord> {
        self.buckets()
            .filter_map(|(name, node)| Bucket::from_store_key(name).map(|b| (b, node)))
            .flat_map(|(bucket, node)| {
                node.as_node()
                    .into_iter()
                    .flat_map(BTreeMap::iter)
                    .filter_map(move |(id, fields)| {
                        ClassificationRecord::from_fields(bucket, id, fields)
                    })
            })
            .collect()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("access", &self.access)
            .finish()
    }
}

fn parse_document(path: &Path, content: &str) -> StoreResult<Value> {
    let malformed = |source| StoreError::MalformedDocument {
        path: path.display().to_string(),
        source,
    };

    let json: serde_json::Value = serde_json::from_str(content).map_err(malformed)?;
    if !json.is_object() {
        return Err(malformed(<serde_json::Error as serde::de::Error>::custom(
            "top level must be an object",
        )));
    }

    Ok(Value::from(json))
}
