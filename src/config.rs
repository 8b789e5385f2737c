//! Engine configuration
//!
//! Loaded from a JSON file; every field is optional and defaults to the
//! safe choice. Writes stay disabled unless the file or the
//! `OPGUARD_ALLOW_WRITES` environment variable turns them on.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Event;
use crate::sanitizer::DEFAULT_MAX_DEPTH;

/// Environment variable that overrides `allow_writes`
pub const ALLOW_WRITES_ENV: &str = "OPGUARD_ALLOW_WRITES";

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "OPG_CONFIG_READ",
            Self::Invalid(_) => "OPG_CONFIG_INVALID",
        }
    }
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Master switch for every mutation (default: false)
    #[serde(default)]
    pub allow_writes: bool,

    /// Limit applied to finds that do not set one (default: 200)
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Sanitizer nesting bound (default: 32)
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Whether unscoped bulk mutations need confirmation (default: true)
    #[serde(default = "default_true")]
    pub require_confirm: bool,

    /// Seconds before an idle pending operation expires; 0 disables expiry
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_secs: u64,

    /// Collection receiving audit records (default: "auditlogs")
    #[serde(default = "default_audit_collection")]
    pub audit_collection: String,

    /// Schema registry file or directory; builtin registry when absent
    #[serde(default)]
    pub registry_path: Option<PathBuf>,
}

fn default_limit() -> u64 {
    200
}
fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
fn default_true() -> bool {
    true
}
fn default_pending_ttl() -> u64 {
    30 * 60
}
fn default_audit_collection() -> String {
    "auditlogs".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_writes: false,
            default_limit: default_limit(),
            max_depth: default_max_depth(),
            require_confirm: true,
            pending_ttl_secs: default_pending_ttl(),
            audit_collection: default_audit_collection(),
            registry_path: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, then apply environment overrides.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Invalid(format!("Invalid config JSON: {}", e)))?;

        config.apply_env();
        config.validate()?;

        tracing::info!(
            event = %Event::ConfigLoaded,
            path = %path.display(),
            allow_writes = config.allow_writes,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// `OPGUARD_ALLOW_WRITES=true` enables writes; any other value
    /// disables them. An unset variable leaves the file's choice alone.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(ALLOW_WRITES_ENV) {
            self.allow_writes = value.trim().eq_ignore_ascii_case("true");
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_limit == 0 {
            return Err(ConfigError::Invalid("default_limit must be > 0".into()));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be > 0".into()));
        }
        if self.audit_collection.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "audit_collection must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn with_writes(mut self) -> Self {
        self.allow_writes = true;
        self
    }

    /// Pending operation time-to-live, if expiry is enabled
    pub fn pending_ttl(&self) -> Option<chrono::Duration> {
        match self.pending_ttl_secs {
            0 => None,
            secs => Some(chrono::Duration::seconds(
                i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_safe() {
        let config = EngineConfig::default();
        assert!(!config.allow_writes);
        assert!(config.require_confirm);
        assert_eq!(config.default_limit, 200);
        assert_eq!(config.audit_collection, "auditlogs");
        assert_eq!(config.pending_ttl(), Some(chrono::Duration::minutes(30)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("opguard.json");
        fs::write(&path, r#"{"default_limit": 50, "pending_ttl_secs": 0}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.default_limit, 50);
        assert_eq!(config.max_depth, 32);
        assert_eq!(config.pending_ttl(), None);
    }

    #[test]
    fn test_validation_rejects_zero_limit() {
        let config = EngineConfig {
            default_limit: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().code(), "OPG_CONFIG_INVALID");
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/opguard.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("opguard.json");
        fs::write(&path, "{allow_writes: yes}").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
