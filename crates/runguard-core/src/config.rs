//! Server configuration.
//!
//! A `ServerConfig` is built once at process start and handed to
//! [`crate::RunServer::new`]; it is never mutated while requests are in
//! flight. Sources, lowest precedence first: defaults, a TOML file,
//! environment variables (`RUNGUARD_MULTI_TENANT`,
//! `RUNGUARD_METRICS_REPORTING`).

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Parameters larger than this (serialized) are rejected at creation.
pub const DEFAULT_MAX_PARAMETER_BYTES: usize = 10_000;

pub const ENV_MULTI_TENANT: &str = "RUNGUARD_MULTI_TENANT";
pub const ENV_METRICS_REPORTING: &str = "RUNGUARD_METRICS_REPORTING";

/// Whether namespaces are resolved and authorized per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMode {
    /// Every caller may touch every run.
    #[default]
    SingleTenant,
    /// Every scoped operation resolves a namespace and asks the authorizer.
    MultiTenant,
}

impl AuthorizationMode {
    pub fn is_multi_tenant(self) -> bool {
        matches!(self, AuthorizationMode::MultiTenant)
    }
}

/// Access check applied to `ReportRunMetrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsReportingAccess {
    /// Only checks that the run exists. Meant for in-cluster reporters.
    #[default]
    TrustedInternal,
    /// Same namespace authorization as the other single-run operations.
    Authorized,
}

impl std::str::FromStr for MetricsReportingAccess {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trusted" | "trusted_internal" => Ok(MetricsReportingAccess::TrustedInternal),
            "authorized" => Ok(MetricsReportingAccess::Authorized),
            other => Err(ConfigError::InvalidValue {
                key: ENV_METRICS_REPORTING.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("malformed access policy: {0}")]
    Policy(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub authorization_mode: AuthorizationMode,
    pub metrics_reporting: MetricsReportingAccess,
    pub max_parameter_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            authorization_mode: AuthorizationMode::SingleTenant,
            metrics_reporting: MetricsReportingAccess::TrustedInternal,
            max_parameter_bytes: DEFAULT_MAX_PARAMETER_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn single_tenant() -> Self {
        Self::default()
    }

    pub fn multi_tenant() -> Self {
        Self {
            authorization_mode: AuthorizationMode::MultiTenant,
            ..Self::default()
        }
    }

    pub fn with_metrics_reporting(mut self, access: MetricsReportingAccess) -> Self {
        self.metrics_reporting = access;
        self
    }

    pub fn with_max_parameter_bytes(mut self, limit: usize) -> Self {
        self.max_parameter_bytes = limit;
        self
    }

    pub fn is_multi_tenant(&self) -> bool {
        self.authorization_mode.is_multi_tenant()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Override fields from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Override fields from an arbitrary variable source.
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MULTI_TENANT) {
            self.authorization_mode = if parse_bool(ENV_MULTI_TENANT, &value)? {
                AuthorizationMode::MultiTenant
            } else {
                AuthorizationMode::SingleTenant
            };
        }
        if let Some(value) = lookup(ENV_METRICS_REPORTING) {
            self.metrics_reporting = value.parse()?;
        }
        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}
