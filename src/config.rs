//! Configuration management for tenant limits.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TenantLimitsError};
use crate::index::{IndexDialect, DEFAULT_BUCKET_PATTERN};

/// Prefix of environment variables overriding file settings,
/// e.g. `TENANT_LIMITS__STORE__DIALECT=pattern_scan`.
pub const ENV_PREFIX: &str = "TENANT_LIMITS";

/// Main configuration for the tenant limits tooling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Limit definition configuration
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot backing the in-process store
    #[serde(default)]
    pub state_path: Option<String>,

    /// How bucket keys are indexed
    #[serde(default)]
    pub dialect: IndexDialect,

    /// Wildcard matching bucket keys in the pattern-scan dialect
    #[serde(default = "default_bucket_pattern")]
    pub bucket_pattern: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: None,
            dialect: IndexDialect::default(),
            bucket_pattern: default_bucket_pattern(),
        }
    }
}

fn default_bucket_pattern() -> String {
    DEFAULT_BUCKET_PATTERN.to_string()
}

/// Limit definition configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Path to the limit definitions YAML file
    #[serde(default)]
    pub path: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::new(path, config::FileFormat::Yaml));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| TenantLimitsError::Config(e.to_string()))
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TenantLimitsError::Config(e.to_string()))
    }
}
