//! Limit definitions and their configuration loading.
//!
//! Limit definitions are owned by the rate limiting engine's configuration.
//! This crate only reads them, in configuration order, to decide which ones
//! apply to a tenant and to render their usage.

mod class;

pub use class::{ClassLimit, FilterOutcome};

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TenantLimitsError};

/// One configured rate limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitDefinition {
    /// Stable identity shared with the limit's buckets
    pub uuid: String,
    /// Route template, may contain `{param}` placeholders
    pub uri: String,
    /// HTTP methods the limit covers; empty means all default verbs
    #[serde(default)]
    pub verbs: Vec<String>,
    /// Label of the refill period
    #[serde(deserialize_with = "deserialize_unit")]
    pub unit: String,
    /// Bucket capacity
    pub value: i64,
    /// Query parameters reflected into the URI as placeholders
    #[serde(default)]
    pub queries: Vec<String>,
    /// Restricts the limit to tenants of this class
    #[serde(default)]
    pub rate_class: Option<String>,
}

impl LimitDefinition {
    /// Whether this limit applies to tenants of `class`.
    pub fn applies_to_class(&self, class: &str) -> bool {
        self.rate_class.as_deref().map_or(true, |rc| rc == class)
    }

    fn validate(&mut self) -> Result<()> {
        if self.uuid.trim().is_empty() {
            return Err(TenantLimitsError::Config(format!(
                "limit for {:?} has an empty uuid",
                self.uri
            )));
        }
        if self.uri.trim().is_empty() {
            return Err(TenantLimitsError::Config(format!(
                "limit {} has an empty uri",
                self.uuid
            )));
        }
        if self.value < 0 {
            return Err(TenantLimitsError::Config(format!(
                "limit {} has a negative value {}",
                self.uuid, self.value
            )));
        }

        for verb in &mut self.verbs {
            *verb = verb.to_uppercase();
        }

        Ok(())
    }
}

/// Units are usually words, but numeric periods show up in real configs.
fn deserialize_unit<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Unit {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Unit::deserialize(deserializer)? {
        Unit::Text(s) => s,
        Unit::Integer(i) => i.to_string(),
        Unit::Float(f) => f.to_string(),
    })
}

/// The ordered list of configured limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitSet {
    #[serde(default)]
    pub limits: Vec<LimitDefinition>,
}

impl LimitSet {
    /// Build a validated set from definitions, keeping their order.
    pub fn new(limits: Vec<LimitDefinition>) -> Result<Self> {
        let mut set = Self { limits };
        set.validate()?;
        Ok(set)
    }

    /// Load limits from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limit definitions");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load limits from a YAML string.
    ///
    /// Accepts either a bare sequence of limits or a mapping with a `limits` key.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut set = if let Ok(limits) = serde_yaml::from_str::<Vec<LimitDefinition>>(yaml) {
            Self { limits }
        } else {
            serde_yaml::from_str::<LimitSet>(yaml).map_err(|e| {
                TenantLimitsError::Config(format!("Failed to parse limit definitions: {}", e))
            })?
        };

        set.validate()?;
        debug!(count = set.limits.len(), "Limit definitions loaded");
        Ok(set)
    }

    fn validate(&mut self) -> Result<()> {
        let mut seen = HashSet::new();
        for limit in &mut self.limits {
            limit.validate()?;
            if !seen.insert(limit.uuid.clone()) {
                return Err(TenantLimitsError::Config(format!(
                    "duplicate limit uuid {}",
                    limit.uuid
                )));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LimitDefinition> {
        self.limits.iter()
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl<'a> IntoIterator for &'a LimitSet {
    type Item = &'a LimitDefinition;
    type IntoIter = std::slice::Iter<'a, LimitDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.limits.iter()
    }
}
