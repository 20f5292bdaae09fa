//! Bucket index lookup.
//!
//! A [`BucketIndex`] finds every persisted bucket visible to a tenant and
//! groups them by limit UUID. Projection depends only on this trait; how the
//! buckets are found is up to the storage dialect:
//!
//! - [`SortedSetIndex`]: per-tenant sorted set of structured keys scored by
//!   expiry, pruned of stale entries once per request.
//! - [`PatternScanIndex`]: wildcard scan over compound `bucket:` keys, where
//!   expired buckets simply read back as missing.

mod pattern;
mod sorted_set;

pub use pattern::{PatternScanIndex, DEFAULT_BUCKET_PATTERN};
pub use sorted_set::{SortedSetIndex, BUCKET_SET_PREFIX};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bucket::{Bucket, BucketKey};
use crate::error::Result;
use crate::store::KeyValueStore;

/// Bound parameters of one bucket.
pub type Params = BTreeMap<String, String>;

/// Buckets of one limit, in the order they were found.
pub type BucketList = Vec<(Params, Bucket)>;

/// Buckets grouped by limit UUID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedBuckets {
    groups: HashMap<String, BucketList>,
}

impl GroupedBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bucket to its limit's group.
    pub fn push(&mut self, key: BucketKey, bucket: Bucket) {
        self.groups
            .entry(key.uuid)
            .or_default()
            .push((key.params, bucket));
    }

    /// Buckets recorded for `uuid`; empty when there are none.
    pub fn get(&self, uuid: &str) -> &[(Params, Bucket)] {
        self.groups.get(uuid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of limits with at least one bucket.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of buckets across all limits.
    pub fn bucket_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Storage dialect used to index a tenant's buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexDialect {
    /// Per-tenant sorted set of structured keys
    #[default]
    SortedSet,
    /// Wildcard scan over compound string keys
    PatternScan,
}

/// Locates the buckets belonging to a tenant.
#[async_trait]
pub trait BucketIndex: Send + Sync {
    /// Storage locality handle for a tenant's buckets.
    fn locality(&self, tenant_id: &str) -> String;

    /// Proactively drop index entries that expired at or before `now`.
    ///
    /// Dialects whose expired buckets vanish on their own have nothing to do.
    async fn prune(&self, _locality: &str, _now: f64) -> Result<usize> {
        Ok(0)
    }

    /// All of `tenant_id`'s buckets found under `locality`, grouped by limit
    /// UUID.
    async fn list_buckets(&self, tenant_id: &str, locality: &str) -> Result<GroupedBuckets>;
}

/// Build the index for a configured dialect.
pub fn build_index(
    dialect: IndexDialect,
    store: Arc<dyn KeyValueStore>,
    bucket_pattern: &str,
) -> Arc<dyn BucketIndex> {
    match dialect {
        IndexDialect::SortedSet => Arc::new(SortedSetIndex::new(store)),
        IndexDialect::PatternScan => Arc::new(PatternScanIndex::new(store, bucket_pattern)),
    }
}

/// Fetch the stored state for decoded keys and group the ones still present.
///
/// `keys` pairs each decoded key with the raw storage key it was read from.
/// Missing values and unparsable bucket payloads are skipped.
pub(crate) async fn fetch_grouped(
    store: &dyn KeyValueStore,
    keys: Vec<(BucketKey, String)>,
) -> Result<GroupedBuckets> {
    let values = try_join_all(keys.iter().map(|(_, raw)| store.get(raw))).await?;

    let mut grouped = GroupedBuckets::new();
    for ((key, raw), value) in keys.into_iter().zip(values) {
        let Some(value) = value else {
            debug!(key = %raw, "Bucket vanished before it could be read");
            continue;
        };

        match Bucket::from_json(&value) {
            Ok(bucket) => grouped.push(key, bucket),
            Err(e) => warn!(key = %raw, error = %e, "Skipping unparsable bucket"),
        }
    }

    Ok(grouped)
}
