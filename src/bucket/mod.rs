//! Bucket state and bucket key encoding.
//!
//! A bucket is the counter the rate limiting engine keeps for one limit and
//! one concrete binding of that limit's placeholders. Its storage key ties
//! the limit's UUID to those bound parameters. Two key dialects exist:
//!
//! - **Compound**: `bucket:<uuid>/<name>=<value>/...`, a single string key
//!   under the `bucket:` namespace. Used by the pattern-scan index.
//! - **Structured**: a JSON object `{"uuid": ..., "params": {...}}`, used as
//!   the member of a per-tenant sorted set.
//!
//! Both decode to the same [`BucketKey`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace prefix of compound bucket keys.
pub const BUCKET_PREFIX: &str = "bucket:";

/// Parameter binding the tenant a class-scoped bucket belongs to.
pub const TENANT_PARAM: &str = "tenant";

/// Persisted counter state for one (limit, parameterization) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Tokens remaining in the current window
    pub messages: i64,
    /// Epoch seconds at which the window resets
    pub expire: f64,
}

impl Bucket {
    pub fn new(messages: i64, expire: f64) -> Self {
        Self { messages, expire }
    }

    /// Whether the bucket's window has already reset at `now`.
    pub fn is_stale(&self, now: f64) -> bool {
        self.expire <= now
    }

    /// Parse the stored JSON representation.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Why a stored key could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BucketKeyError {
    #[error("key {0:?} is missing the \"bucket:\" prefix")]
    MissingPrefix(String),

    #[error("key {0:?} has no delimiter between UUID and parameters")]
    MissingDelimiter(String),

    #[error("key {0:?} has an empty UUID")]
    EmptyUuid(String),

    #[error("key {key:?} has a malformed parameter {param:?}")]
    MalformedParam { key: String, param: String },

    #[error("structured key is not valid: {0}")]
    Structured(String),
}

/// Identity of a bucket: the limit it belongs to plus its bound parameters.
///
/// Parameters are held in a sorted map so that encoding never depends on the
/// order in which they were bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub uuid: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl BucketKey {
    pub fn new(uuid: impl Into<String>, params: BTreeMap<String, String>) -> Self {
        Self {
            uuid: uuid.into(),
            params,
        }
    }

    /// Whether the key is visible to `tenant_id`.
    ///
    /// Keys without a tenant binding are shared and visible to everyone.
    pub fn belongs_to(&self, tenant_id: &str) -> bool {
        self.params
            .get(TENANT_PARAM)
            .map_or(true, |owner| owner == tenant_id)
    }

    /// Encode as a compound string key.
    pub fn encode_compound(&self) -> String {
        let mut key = format!("{}{}/", BUCKET_PREFIX, self.uuid);
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
            .collect();
        key.push_str(&params.join("/"));
        key
    }

    /// Decode a compound string key.
    ///
    /// The `bucket:` prefix is checked rather than skipped by offset, so a key
    /// from another namespace is rejected instead of misread.
    pub fn decode_compound(key: &str) -> Result<Self, BucketKeyError> {
        let rest = key
            .strip_prefix(BUCKET_PREFIX)
            .ok_or_else(|| BucketKeyError::MissingPrefix(key.to_string()))?;

        let (uuid, payload) = rest
            .split_once('/')
            .ok_or_else(|| BucketKeyError::MissingDelimiter(key.to_string()))?;

        if uuid.is_empty() {
            return Err(BucketKeyError::EmptyUuid(key.to_string()));
        }

        let mut params = BTreeMap::new();
        for param in payload.split('/').filter(|p| !p.is_empty()) {
            let malformed = || BucketKeyError::MalformedParam {
                key: key.to_string(),
                param: param.to_string(),
            };

            let (name, value) = param.split_once('=').ok_or_else(malformed)?;
            let name = unescape(name).ok_or_else(malformed)?;
            let value = unescape(value).ok_or_else(malformed)?;
            params.insert(name, value);
        }

        Ok(Self::new(uuid, params))
    }

    /// Encode as a structured (JSON object) key.
    pub fn encode_structured(&self) -> String {
        // A map of strings always serializes
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode a structured key.
    pub fn decode_structured(key: &str) -> Result<Self, BucketKeyError> {
        let decoded: Self =
            serde_json::from_str(key).map_err(|e| BucketKeyError::Structured(e.to_string()))?;

        if decoded.uuid.is_empty() {
            return Err(BucketKeyError::EmptyUuid(key.to_string()));
        }

        Ok(decoded)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode_compound())
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3)?;
        out.push(match code {
            "25" => '%',
            "2F" | "2f" => '/',
            "3D" | "3d" => '=',
            _ => return None,
        });
        rest = &rest[pos + 3..];
    }

    out.push_str(rest);
    Some(out)
}
