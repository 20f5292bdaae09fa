//! Class-scoped limits.
//!
//! A class-scoped limit only applies to requests whose resolved rate limit
//! class matches its `rate_class`, and keys its buckets by tenant so each
//! tenant of the class gets its own counters.

use std::collections::BTreeMap;

use super::LimitDefinition;
use crate::bucket::TENANT_PARAM;
use crate::error::{Result, TenantLimitsError};
use crate::resolver::RequestContext;

/// API version prefixes stripped before route matching.
const VERSION_PREFIXES: [&str; 2] = ["/v1.1/", "/v2/"];

/// Result of checking a class-scoped limit against a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The limit applies; bucket params have been extended.
    Apply,
    /// The limit does not apply to this request.
    Defer,
}

/// A limit that applies only to one rate limit class.
#[derive(Debug, Clone)]
pub struct ClassLimit {
    limit: LimitDefinition,
    rate_class: String,
}

impl ClassLimit {
    /// Wrap a definition. The definition must name a `rate_class`.
    pub fn new(limit: LimitDefinition) -> Result<Self> {
        let rate_class = limit.rate_class.clone().ok_or_else(|| {
            TenantLimitsError::Config(format!("class limit {} requires a rate_class", limit.uuid))
        })?;
        Ok(Self { limit, rate_class })
    }

    pub fn definition(&self) -> &LimitDefinition {
        &self.limit
    }

    pub fn rate_class(&self) -> &str {
        &self.rate_class
    }

    /// Strip the API version segment from a request URI.
    ///
    /// `/v1.1/servers` and `/v2/servers` both route as `/servers`; a bare
    /// version root is left unchanged.
    pub fn route<'a>(&self, uri: &'a str) -> &'a str {
        for prefix in VERSION_PREFIXES {
            if uri.starts_with(prefix) {
                // Keep the trailing slash of the prefix as the new root
                return &uri[prefix.len() - 1..];
            }
        }
        uri
    }

    /// Decide whether the limit applies to `request`.
    ///
    /// Requires both a resolved tenant and a class on the request, and the
    /// class must match. On a match the tenant is bound into `params` so the
    /// bucket is tenant-specific. Nothing is modified on deferral.
    pub fn filter(
        &self,
        request: &RequestContext,
        params: &mut BTreeMap<String, String>,
    ) -> FilterOutcome {
        let (Some(tenant), Some(class)) = (request.tenant.as_ref(), request.limit_class.as_deref())
        else {
            return FilterOutcome::Defer;
        };

        if class != self.rate_class {
            return FilterOutcome::Defer;
        }

        params.insert(TENANT_PARAM.to_string(), tenant.tenant_id.clone());
        FilterOutcome::Apply
    }
}
