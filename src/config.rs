//! Engine configuration
//!
//! Defaults are usable as-is; `from_env` overlays `REGENGINE_*` variables
//! (a `.env` file is honoured when present).

use crate::error::ComplianceError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How a rule referencing an unregistered condition or transformation is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownNamePolicy {
    /// Record an `error` outcome naming the unknown entry
    Strict,
    /// Pass (validation) or leave data untouched (transformation)
    Permissive,
}

impl FromStr for UnknownNamePolicy {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(UnknownNamePolicy::Strict),
            "permissive" => Ok(UnknownNamePolicy::Permissive),
            other => Err(ComplianceError::Config(format!(
                "unknown policy '{}' (expected strict or permissive)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum interpretations held in the cache
    pub cache_capacity: usize,
    /// Seconds before a cached interpretation expires
    pub cache_ttl_secs: u64,
    pub unknown_condition_policy: UnknownNamePolicy,
    pub unknown_transformation_policy: UnknownNamePolicy,
    /// Maximum evaluation records kept by the audit log
    pub audit_capacity: usize,
    pub rules_path: Option<PathBuf>,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            cache_ttl_secs: 3600,
            unknown_condition_policy: UnknownNamePolicy::Strict,
            unknown_transformation_policy: UnknownNamePolicy::Strict,
            audit_capacity: 256,
            rules_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test fixtures)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("REGENGINE_CACHE_CAPACITY") {
            config.cache_capacity = parse_number("REGENGINE_CACHE_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("REGENGINE_CACHE_TTL_SECS") {
            config.cache_ttl_secs = parse_number("REGENGINE_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("REGENGINE_UNKNOWN_CONDITION_POLICY") {
            config.unknown_condition_policy = v.parse()?;
        }
        if let Some(v) = lookup("REGENGINE_UNKNOWN_TRANSFORMATION_POLICY") {
            config.unknown_transformation_policy = v.parse()?;
        }
        if let Some(v) = lookup("REGENGINE_AUDIT_CAPACITY") {
            config.audit_capacity = parse_number("REGENGINE_AUDIT_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("REGENGINE_RULES_PATH") {
            if !v.trim().is_empty() {
                config.rules_path = Some(PathBuf::from(v.trim()));
            }
        }
        if let Some(v) = lookup("REGENGINE_LOG_LEVEL") {
            config.log_level = v.trim().to_string();
        }

        if config.cache_capacity == 0 {
            return Err(ComplianceError::Config(
                "REGENGINE_CACHE_CAPACITY must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ComplianceError::Config(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}
