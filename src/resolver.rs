//! Tenant and rate limit class resolution.
//!
//! Runs once per request before the request is admitted. It decides who the
//! caller is, which rate limit class applies to them, and where their bucket
//! index lives, and records all of it on the [`RequestContext`].

use std::sync::Arc;

use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::index::BucketIndex;
use crate::projection::UsageRecord;
use crate::store::KeyValueStore;

/// Tenant identity used when the request carries no caller context.
pub const UNKNOWN_TENANT: &str = "<NONE>";

/// Class of tenants without an explicit mapping.
pub const DEFAULT_CLASS: &str = "default";

/// Store key holding a tenant's rate limit class.
pub fn class_key(tenant_id: &str) -> String {
    format!("limit-class:{}", tenant_id)
}

/// The class a stored mapping names, `default` when it is missing or empty.
pub fn configured_class(stored: Option<String>) -> String {
    stored
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CLASS.to_string())
}

/// Authenticated caller details provided by the API layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    /// Project (tenant) the caller acts for
    pub project_id: String,
    /// Quota class used by the API's own quota engine
    pub quota_class: Option<String>,
}

impl CallerContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            quota_class: None,
        }
    }
}

/// The caller's resolved identity and rate limit class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,
    pub rate_limit_class: String,
    /// Where this tenant's bucket index lives in the store
    pub bucket_locality: String,
}

/// Per-request state shared by the resolution and projection phases.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Caller details, when the request was authenticated
    pub caller: Option<CallerContext>,
    /// Effective rate limit class; an earlier stage may preset it
    pub limit_class: Option<String>,
    /// Set by the resolver
    pub tenant: Option<TenantContext>,
    /// Usage report, set by the projector for the API layer to render
    pub limits: Option<Vec<UsageRecord>>,
}

impl RequestContext {
    /// A request made on behalf of `project_id`.
    pub fn for_caller(project_id: impl Into<String>) -> Self {
        Self {
            caller: Some(CallerContext::new(project_id)),
            ..Self::default()
        }
    }

    /// Preset the effective class so resolution will not replace it.
    pub fn with_limit_class(mut self, class: impl Into<String>) -> Self {
        self.limit_class = Some(class.into());
        self
    }
}

/// Resolves the tenant and class for a request.
pub struct Resolver {
    store: Arc<dyn KeyValueStore>,
    index: Arc<dyn BucketIndex>,
    clock: Arc<dyn Clock>,
}

impl Resolver {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        index: Arc<dyn BucketIndex>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            index,
            clock,
        }
    }

    /// Resolve the caller's tenant and class and attach them to `request`.
    ///
    /// A class already present on the request wins over the stored mapping.
    /// Stale bucket index entries for the tenant are pruned as a side effect.
    pub async fn resolve(&self, request: &mut RequestContext) -> Result<TenantContext> {
        let tenant_id = request
            .caller
            .as_ref()
            .map(|c| c.project_id.clone())
            .unwrap_or_else(|| UNKNOWN_TENANT.to_string());

        let stored = self.store.get(&class_key(&tenant_id)).await?;
        let class = request
            .limit_class
            .get_or_insert_with(|| configured_class(stored))
            .clone();

        if let Some(caller) = request.caller.as_mut() {
            if caller.quota_class.is_none() {
                caller.quota_class = Some(class.clone());
            }
        }

        let locality = self.index.locality(&tenant_id);
        self.index.prune(&locality, self.clock.now()).await?;

        let tenant = TenantContext {
            tenant_id,
            rate_limit_class: class,
            bucket_locality: locality,
        };

        debug!(
            tenant = %tenant.tenant_id,
            class = %tenant.rate_limit_class,
            locality = %tenant.bucket_locality,
            "Resolved tenant"
        );

        request.tenant = Some(tenant.clone());
        Ok(tenant)
    }
}
