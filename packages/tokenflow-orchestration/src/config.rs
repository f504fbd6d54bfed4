//! Platform configuration (YAML)
//!
//! ```yaml
//! logging:
//!   filter: "info,tokenflow_orchestration=debug"
//! deployments:
//!   default_page_size: 20
//!   max_page_size: 100
//!   emit_webhooks: true
//!   webhook_timeout_secs: 30
//! audit:
//!   retention_years: 7
//!   regulatory_framework: "MICA"
//! ```
//!
//! Every section is optional; missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Shortest retention period any audit trail may be configured with
pub const MIN_RETENTION_YEARS: u32 = 7;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid range for field '{field}': {value} not in {min}..={max}. {hint}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
        hint: String,
    },

    #[error("Invalid value for field '{field}'. {hint}")]
    Invalid { field: String, hint: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    pub fn range(
        field: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
        hint: impl Into<String>,
    ) -> Self {
        ConfigError::Range {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            hint: hint.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, hint: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            hint: hint.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Publish webhook events for real transitions
    pub emit_webhooks: bool,
    /// Upper bound on a single webhook delivery before it is abandoned
    pub webhook_timeout_secs: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            emit_webhooks: true,
            webhook_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub retention_years: u32,
    pub regulatory_framework: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_years: MIN_RETENTION_YEARS,
            regulatory_framework: "MICA".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    pub logging: LoggingConfig,
    pub deployments: DeploymentConfig,
    pub audit: AuditConfig,
}

impl PlatformConfig {
    /// Parse and validate
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: PlatformConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let d = &self.deployments;
        if d.max_page_size == 0 || d.max_page_size > 10_000 {
            return Err(ConfigError::range(
                "deployments.max_page_size",
                d.max_page_size,
                1,
                10_000,
                "Use a page size the API can serve in one response.",
            ));
        }
        if d.default_page_size == 0 || d.default_page_size > d.max_page_size {
            return Err(ConfigError::range(
                "deployments.default_page_size",
                d.default_page_size,
                1,
                d.max_page_size,
                "The default page size must not exceed max_page_size.",
            ));
        }
        if d.webhook_timeout_secs == 0 || d.webhook_timeout_secs > 3_600 {
            return Err(ConfigError::range(
                "deployments.webhook_timeout_secs",
                d.webhook_timeout_secs,
                1,
                3_600,
                "A stalled endpoint holds back later events until this timeout.",
            ));
        }

        let a = &self.audit;
        if a.retention_years < MIN_RETENTION_YEARS || a.retention_years > 100 {
            return Err(ConfigError::range(
                "audit.retention_years",
                a.retention_years,
                MIN_RETENTION_YEARS,
                100,
                "Audit trails must be kept for at least seven years.",
            ));
        }
        if a.regulatory_framework.trim().is_empty() {
            return Err(ConfigError::invalid(
                "audit.regulatory_framework",
                "Name the regulatory framework the retention policy satisfies (e.g. MICA).",
            ));
        }

        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::invalid(
                "logging.filter",
                "Use a tracing filter directive such as 'info'.",
            ));
        }
        Ok(())
    }
}
