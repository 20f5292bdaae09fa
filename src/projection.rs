//! Limit projection.
//!
//! Turns limit definitions and the tenant's grouped buckets into the
//! public usage report: one record per limit and verb, plus one record per
//! bucket when a limit has several concrete bindings.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bucket::Bucket;
use crate::clock::Clock;
use crate::error::Result;
use crate::index::{BucketIndex, GroupedBuckets, Params};
use crate::limits::{LimitDefinition, LimitSet};
use crate::resolver::TenantContext;
use crate::template::format_uri;

/// Verbs covered by a limit that lists none.
pub const DEFAULT_VERBS: [&str; 5] = ["GET", "HEAD", "POST", "PUT", "DELETE"];

/// Unit label used when the configured unit is a bare number.
pub const UNKNOWN_UNIT: &str = "UNKNOWN";

/// One entry of the public quota usage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub verb: String,
    #[serde(rename = "URI")]
    pub uri: String,
    pub regex: String,
    pub value: i64,
    pub unit: String,
    pub remaining: i64,
    /// Epoch seconds
    #[serde(rename = "resetTime")]
    pub reset_time: f64,
}

/// Upper-case a unit label, mapping purely numeric units to `UNKNOWN`.
pub fn normalize_unit(unit: &str) -> String {
    let unit = unit.to_uppercase();
    if !unit.is_empty() && unit.chars().all(|c| c.is_ascii_digit()) {
        UNKNOWN_UNIT.to_string()
    } else {
        unit
    }
}

/// The limit's URI with its query names appended as sorted placeholders.
pub fn materialize_uri(limit: &LimitDefinition) -> String {
    if limit.queries.is_empty() {
        return limit.uri.clone();
    }

    let mut names: Vec<&str> = limit.queries.iter().map(String::as_str).collect();
    names.sort_unstable();

    let query: Vec<String> = names.iter().map(|q| format!("{}={{{}}}", q, q)).collect();
    format!("{}?{}", limit.uri, query.join("&"))
}

/// Project a single limit against its buckets.
pub fn project_limit(
    limit: &LimitDefinition,
    buckets: &[(Params, Bucket)],
    now: f64,
) -> Vec<UsageRecord> {
    let uri = materialize_uri(limit);
    let unit = normalize_unit(&limit.unit);
    let verbs: Vec<&str> = if limit.verbs.is_empty() {
        DEFAULT_VERBS.to_vec()
    } else {
        limit.verbs.iter().map(String::as_str).collect()
    };

    // Tightest remaining and latest reset summarize the group
    let (remaining, reset_time) = match buckets.split_first() {
        Some(((_, first), rest)) => rest.iter().fold(
            (first.messages, first.expire),
            |(remaining, reset), (_, bucket)| {
                (remaining.min(bucket.messages), reset.max(bucket.expire))
            },
        ),
        None => (limit.value, now),
    };

    let per_bucket = buckets.len() > 1;
    let capacity = verbs.len() * if per_bucket { buckets.len() + 1 } else { 1 };
    let mut records = Vec::with_capacity(capacity);

    let record = |verb: &str, uri: String, remaining: i64, reset_time: f64| UsageRecord {
        verb: verb.to_string(),
        regex: uri.clone(),
        uri,
        value: limit.value,
        unit: unit.clone(),
        remaining,
        reset_time,
    };

    for verb in verbs {
        if per_bucket {
            for (params, bucket) in buckets {
                records.push(record(
                    verb,
                    format_uri(&uri, params),
                    bucket.messages,
                    bucket.expire,
                ));
            }
        }

        records.push(record(verb, uri.clone(), remaining, reset_time));
    }

    records
}

/// Project every limit applicable to `class`, in configuration order.
pub fn project(
    limits: &LimitSet,
    class: &str,
    buckets: &GroupedBuckets,
    now: f64,
) -> Vec<UsageRecord> {
    limits
        .iter()
        .filter(|limit| limit.applies_to_class(class))
        .flat_map(|limit| project_limit(limit, buckets.get(&limit.uuid), now))
        .collect()
}

/// Reads a tenant's buckets and renders the usage report.
pub struct Projector {
    index: Arc<dyn BucketIndex>,
    limits: Arc<LimitSet>,
    clock: Arc<dyn Clock>,
}

impl Projector {
    pub fn new(index: Arc<dyn BucketIndex>, limits: Arc<LimitSet>, clock: Arc<dyn Clock>) -> Self {
        Self {
            index,
            limits,
            clock,
        }
    }

    /// Build the usage report for a resolved tenant.
    pub async fn project(&self, tenant: &TenantContext) -> Result<Vec<UsageRecord>> {
        let buckets = self
            .index
            .list_buckets(&tenant.tenant_id, &tenant.bucket_locality)
            .await?;
        let records = project(
            &self.limits,
            &tenant.rate_limit_class,
            &buckets,
            self.clock.now(),
        );

        debug!(
            tenant = %tenant.tenant_id,
            class = %tenant.rate_limit_class,
            records = records.len(),
            "Projected limit usage"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketKey;

    const NOW: f64 = 1000000.0;

    fn limit(uuid: &str, uri: &str, verbs: &[&str], unit: &str, value: i64) -> LimitDefinition {
        LimitDefinition {
            uuid: uuid.to_string(),
            uri: uri.to_string(),
            verbs: verbs.iter().map(|v| v.to_string()).collect(),
            unit: unit.to_string(),
            value,
            queries: Vec::new(),
            rate_class: None,
        }
    }

    fn record(verb: &str, uri: &str, value: i64, unit: &str, remaining: i64, reset: f64) -> UsageRecord {
        UsageRecord {
            verb: verb.to_string(),
            uri: uri.to_string(),
            regex: uri.to_string(),
            value,
            unit: unit.to_string(),
            remaining,
            reset_time: reset,
        }
    }

    fn bucket_key(uuid: &str, pairs: &[(&str, &str)]) -> BucketKey {
        BucketKey::new(
            uuid,
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        )
    }

    #[test]
    fn test_normalize_unit() {
        assert_eq!(normalize_unit("minute"), "MINUTE");
        assert_eq!(normalize_unit("1234"), "UNKNOWN");
        assert_eq!(normalize_unit(""), "");
        assert_eq!(normalize_unit("12a"), "12A");
        // Only ASCII digits count as numeric
        assert_eq!(normalize_unit("Ⅻ"), "Ⅻ");
        assert_eq!(normalize_unit("½"), "½");
        // Idempotent
        for unit in ["second", "1234", "Day", "UNKNOWN"] {
            let once = normalize_unit(unit);
            assert_eq!(normalize_unit(&once), once);
        }
    }

    #[test]
    fn test_materialize_uri_sorts_queries() {
        let mut lim = limit("uuid6", "/spam/uri6", &["GET"], "day", 1);
        assert_eq!(materialize_uri(&lim), "/spam/uri6");

        lim.queries = vec!["bravo".to_string(), "alfa".to_string()];
        assert_eq!(materialize_uri(&lim), "/spam/uri6?alfa={alfa}&bravo={bravo}");
    }

    #[test]
    fn test_limits_without_buckets() {
        let mut uuid3 = limit("uuid3", "/spam/uri3", &["GET"], "hour", 17);
        uuid3.rate_class = Some("spam".to_string());
        let mut uuid4 = limit("uuid4", "/spam/uri4", &["GET"], "day", 1);
        uuid4.rate_class = Some("lim_class".to_string());
        let mut uuid6 = limit("uuid6", "/spam/uri6", &["GET"], "day", 1);
        uuid6.queries = vec!["bravo".to_string(), "alfa".to_string()];

        let limits = LimitSet::new(vec![
            limit("uuid", "/spam/uri", &["GET", "PUT"], "minute", 23),
            limit("uuid2", "/spam/uri2", &[], "second", 18),
            uuid3,
            uuid4,
            limit("uuid5", "/spam/uri5", &["GET"], "1234", 183),
            uuid6,
        ])
        .unwrap();

        let records = project(&limits, "lim_class", &GroupedBuckets::new(), NOW);

        assert_eq!(
            records,
            vec![
                record("GET", "/spam/uri", 23, "MINUTE", 23, NOW),
                record("PUT", "/spam/uri", 23, "MINUTE", 23, NOW),
                record("GET", "/spam/uri2", 18, "SECOND", 18, NOW),
                record("HEAD", "/spam/uri2", 18, "SECOND", 18, NOW),
                record("POST", "/spam/uri2", 18, "SECOND", 18, NOW),
                record("PUT", "/spam/uri2", 18, "SECOND", 18, NOW),
                record("DELETE", "/spam/uri2", 18, "SECOND", 18, NOW),
                record("GET", "/spam/uri4", 1, "DAY", 1, NOW),
                record("GET", "/spam/uri5", 183, "UNKNOWN", 183, NOW),
                record(
                    "GET",
                    "/spam/uri6?alfa={alfa}&bravo={bravo}",
                    1,
                    "DAY",
                    1,
                    NOW
                ),
            ]
        );
    }

    #[test]
    fn test_limits_with_buckets() {
        let limits = LimitSet::new(vec![
            limit("uuid", "/spam/{uri}", &["GET"], "minute", 7),
            limit("uuid2", "/spam/{uri2}/{used}", &["GET"], "minute", 20),
            limit("uuid3", "/spam/{uri3}/{param}", &["GET"], "minute", 50),
            limit("uuid4", "/spam/{uri4}/{param}", &["GET"], "minute", 50),
            limit("uuid5", "/spam/{uri5}", &["GET"], "minute", 10),
        ])
        .unwrap();

        let mut buckets = GroupedBuckets::new();
        buckets.push(bucket_key("uuid", &[]), Bucket::new(2, 1000001.0));
        buckets.push(bucket_key("uuid2", &[("unused", "foo")]), Bucket::new(5, 999999.0));
        buckets.push(bucket_key("uuid3", &[("param", "foo")]), Bucket::new(10, 1000005.0));
        buckets.push(bucket_key("uuid3", &[("param", "bar")]), Bucket::new(5, 1000001.0));

        let records = project(&limits, "lim_class", &buckets, NOW);

        assert_eq!(
            records,
            vec![
                record("GET", "/spam/{uri}", 7, "MINUTE", 2, 1000001.0),
                record("GET", "/spam/{uri2}/{used}", 20, "MINUTE", 5, 999999.0),
                record("GET", "/spam/{uri3}/foo", 50, "MINUTE", 10, 1000005.0),
                record("GET", "/spam/{uri3}/bar", 50, "MINUTE", 5, 1000001.0),
                record("GET", "/spam/{uri3}/{param}", 50, "MINUTE", 5, 1000005.0),
                record("GET", "/spam/{uri4}/{param}", 50, "MINUTE", 50, NOW),
                record("GET", "/spam/{uri5}", 10, "MINUTE", 10, NOW),
            ]
        );
    }

    #[test]
    fn test_record_counts_per_verb() {
        let lim = limit("uuid", "/servers/{id}", &[], "minute", 10);
        let buckets: Vec<(Params, Bucket)> = (0..3)
            .map(|i| {
                let id = i.to_string();
                let key = bucket_key("uuid", &[("id", id.as_str())]);
                (key.params, Bucket::new(i, NOW + i as f64))
            })
            .collect();

        assert_eq!(project_limit(&lim, &[], NOW).len(), 5);
        assert_eq!(project_limit(&lim, &buckets[..1], NOW).len(), 5);
        let records = project_limit(&lim, &buckets, NOW);
        assert_eq!(records.len(), 5 * 4);

        // Per-bucket records precede the summary within each verb
        assert_eq!(records[0].verb, "GET");
        assert_eq!(records[0].uri, "/servers/0");
        assert_eq!(records[3].uri, "/servers/{id}");
        assert_eq!(records[3].remaining, 0);
        assert_eq!(records[3].reset_time, NOW + 2.0);
        assert_eq!(records[4].verb, "HEAD");
    }

    #[test]
    fn test_single_bucket_summary_uses_bucket() {
        let lim = limit("uuid", "/servers/{id}", &["POST"], "minute", 10);
        let key = bucket_key("uuid", &[("id", "7")]);
        let records = project_limit(&lim, &[(key.params, Bucket::new(3, NOW + 30.0))], NOW);

        assert_eq!(records, vec![record("POST", "/servers/{id}", 10, "MINUTE", 3, NOW + 30.0)]);
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(record("GET", "/spam", 1, "DAY", 1, NOW)).unwrap();
        assert_eq!(json["URI"], "/spam");
        assert_eq!(json["regex"], "/spam");
        assert_eq!(json["resetTime"], NOW);
        assert!(json.get("reset_time").is_none());
    }
}
