//! Sorted-set bucket index.
//!
//! The engine records each tenant's bucket keys in `bucket_set:<tenant>`,
//! scored by the bucket's expiry. Members are structured keys and also serve
//! as the storage key of the bucket state itself.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use super::{fetch_grouped, BucketIndex, GroupedBuckets};
use crate::bucket::BucketKey;
use crate::error::Result;
use crate::store::KeyValueStore;

/// Prefix of per-tenant bucket sets.
pub const BUCKET_SET_PREFIX: &str = "bucket_set:";

/// Bucket index backed by one sorted set per tenant.
pub struct SortedSetIndex {
    store: Arc<dyn KeyValueStore>,
}

impl SortedSetIndex {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BucketIndex for SortedSetIndex {
    fn locality(&self, tenant_id: &str) -> String {
        format!("{}{}", BUCKET_SET_PREFIX, tenant_id)
    }

    async fn prune(&self, locality: &str, now: f64) -> Result<usize> {
        let removed = self.store.zremrangebyscore(locality, 0.0, now).await?;
        trace!(bucket_set = %locality, removed, "Pruned expired bucket keys");
        Ok(removed)
    }

    /// The set is already per tenant, so every member is listed.
    async fn list_buckets(&self, _tenant_id: &str, locality: &str) -> Result<GroupedBuckets> {
        let members = self.store.zrange(locality, 0, -1).await?;

        let mut keys = Vec::with_capacity(members.len());
        for member in members {
            match BucketKey::decode_structured(&member) {
                Ok(key) => keys.push((key, member)),
                Err(e) => warn!(bucket_set = %locality, error = %e, "Skipping undecodable bucket key"),
            }
        }

        let grouped = fetch_grouped(self.store.as_ref(), keys).await?;
        debug!(
            bucket_set = %locality,
            limits = grouped.len(),
            buckets = grouped.bucket_count(),
            "Listed tenant buckets"
        );
        Ok(grouped)
    }
}
