//! Pre/post request hooks composing resolution and projection.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::clock::Clock;
use crate::error::{Result, TenantLimitsError};
use crate::index::{build_index, BucketIndex, IndexDialect};
use crate::limits::LimitSet;
use crate::projection::Projector;
use crate::resolver::{RequestContext, Resolver};
use crate::store::KeyValueStore;

/// Tenant-aware hooks around the rate limiting middleware.
pub struct TenantLimits {
    resolver: Resolver,
    projector: Projector,
}

impl TenantLimits {
    /// Wire the hooks over a store, bucket index and limit set.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        index: Arc<dyn BucketIndex>,
        limits: Arc<LimitSet>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver: Resolver::new(store, index.clone(), clock.clone()),
            projector: Projector::new(index, limits, clock),
        }
    }

    /// Wire the hooks using the index for a storage dialect.
    pub fn with_dialect(
        store: Arc<dyn KeyValueStore>,
        dialect: IndexDialect,
        bucket_pattern: &str,
        limits: Arc<LimitSet>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let index = build_index(dialect, store.clone(), bucket_pattern);
        Self::new(store, index, limits, clock)
    }

    /// Resolve the tenant and class before the request is admitted.
    #[instrument(skip_all)]
    pub async fn preprocess(&self, request: &mut RequestContext) -> Result<()> {
        self.resolver.resolve(request).await?;
        Ok(())
    }

    /// Attach the tenant's usage report to the request.
    ///
    /// Fails if [`preprocess`](Self::preprocess) has not run for this request.
    #[instrument(skip_all)]
    pub async fn postprocess(&self, request: &mut RequestContext) -> Result<()> {
        let tenant = request.tenant.as_ref().ok_or_else(|| {
            TenantLimitsError::Context("request has no resolved tenant".to_string())
        })?;

        let records = self.projector.project(tenant).await?;
        info!(
            tenant = %tenant.tenant_id,
            class = %tenant.rate_limit_class,
            records = records.len(),
            "Usage report attached"
        );

        request.limits = Some(records);
        Ok(())
    }

    /// Run both hooks back to back.
    pub async fn process(&self, request: &mut RequestContext) -> Result<()> {
        self.preprocess(request).await?;
        self.postprocess(request).await
    }
}
