//! Engine configuration
//!
//! Loaded from TOML, then overridden by `GOVERNANCE_*` environment
//! variables. Every field has a default, so an empty file is valid.
//!
//! ```toml
//! [audit]
//! queue_capacity = 1024
//!
//! [permissions]
//! cache_ttl_secs = 60
//! cache_max_entries = 10000
//! max_hierarchy_depth = 16
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

pub const ENV_QUEUE_CAPACITY: &str = "GOVERNANCE_AUDIT_QUEUE_CAPACITY";
pub const ENV_CACHE_TTL_SECS: &str = "GOVERNANCE_CACHE_TTL_SECS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "GOVERNANCE_CACHE_MAX_ENTRIES";
pub const ENV_MAX_HIERARCHY_DEPTH: &str = "GOVERNANCE_MAX_HIERARCHY_DEPTH";

/// Upper bound for `permissions.cache_ttl_secs` (one hour)
pub const MAX_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var}={value} is not a valid value")]
    Env { var: String, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Audit chain writer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Bound of the writer queue; a full queue triggers a synchronous write
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

/// Permission evaluator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionConfig {
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    /// Limit on role-inheritance and resource-parent walks
    pub max_hierarchy_depth: usize,
}

impl PermissionConfig {
    /// Cache TTL as a duration; rejects values above [`MAX_CACHE_TTL_SECS`].
    pub fn cache_ttl(&self) -> Result<Duration, ConfigError> {
        if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "permissions.cache_ttl_secs must be at most {MAX_CACHE_TTL_SECS}, got {}",
                self.cache_ttl_secs
            )));
        }
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "permissions.cache_ttl_secs {} is out of range",
                    self.cache_ttl_secs
                ))
            })
    }
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60,
            cache_max_entries: 10_000,
            max_hierarchy_depth: 16,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub audit: AuditConfig,
    pub permissions: PermissionConfig,
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}

impl GovernanceConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: GovernanceConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (defaults if it does not exist), then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let contents = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                toml::from_str(&contents)?
            }
            _ => GovernanceConfig::default(),
        };
        config.apply_overrides(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GOVERNANCE_*` overrides from `vars`; unrelated keys are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                ENV_QUEUE_CAPACITY => self.audit.queue_capacity = parse_env(&key, &value)?,
                ENV_CACHE_TTL_SECS => self.permissions.cache_ttl_secs = parse_env(&key, &value)?,
                ENV_CACHE_MAX_ENTRIES => {
                    self.permissions.cache_max_entries = parse_env(&key, &value)?
                }
                ENV_MAX_HIERARCHY_DEPTH => {
                    self.permissions.max_hierarchy_depth = parse_env(&key, &value)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "audit.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.permissions.max_hierarchy_depth == 0 {
            return Err(ConfigError::Invalid(
                "permissions.max_hierarchy_depth must be at least 1".to_string(),
            ));
        }
        self.permissions.cache_ttl()?;
        Ok(())
    }
}
