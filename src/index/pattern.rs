//! Pattern-scan bucket index.
//!
//! Buckets live under compound `bucket:<uuid>/<params>` string keys that the
//! engine writes with an expiry. A scan over the namespace wildcard finds
//! them; a key that expires between the scan and the read is just absent.
//! The namespace is shared, so keys bound to another tenant are filtered out
//! after decoding.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{fetch_grouped, BucketIndex, GroupedBuckets};
use crate::bucket::BucketKey;
use crate::error::Result;
use crate::store::KeyValueStore;

/// Default wildcard covering every compound bucket key.
pub const DEFAULT_BUCKET_PATTERN: &str = "bucket:*";

/// Bucket index that scans a key namespace.
pub struct PatternScanIndex {
    store: Arc<dyn KeyValueStore>,
    pattern: String,
}

impl PatternScanIndex {
    pub fn new(store: Arc<dyn KeyValueStore>, pattern: impl Into<String>) -> Self {
        Self {
            store,
            pattern: pattern.into(),
        }
    }
}

#[async_trait]
impl BucketIndex for PatternScanIndex {
    /// Every tenant shares the one namespace.
    fn locality(&self, _tenant_id: &str) -> String {
        self.pattern.clone()
    }

    async fn list_buckets(&self, tenant_id: &str, locality: &str) -> Result<GroupedBuckets> {
        let raw_keys = self.store.keys(locality).await?;

        let mut keys = Vec::with_capacity(raw_keys.len());
        for raw in raw_keys {
            match BucketKey::decode_compound(&raw) {
                Ok(key) if key.belongs_to(tenant_id) => keys.push((key, raw)),
                Ok(_) => {}
                Err(e) => warn!(pattern = %locality, error = %e, "Skipping undecodable bucket key"),
            }
        }

        let grouped = fetch_grouped(self.store.as_ref(), keys).await?;
        debug!(
            tenant = %tenant_id,
            pattern = %locality,
            limits = grouped.len(),
            buckets = grouped.bucket_count(),
            "Scanned buckets"
        );
        Ok(grouped)
    }
}
