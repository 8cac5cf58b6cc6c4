//! Configuration for the profiler.
//!
//! [`ProfilerConfig`] is built in code with the builder methods, or loaded
//! from `CALLPROF_*` environment variables (and an optional `.env` file)
//! when the `config` feature is enabled.
//!
//! | variable | default |
//! |---|---|
//! | `CALLPROF_ENABLED` | `true` |
//! | `CALLPROF_BASE_PREFIX` | empty (all owners) |
//! | `CALLPROF_EXCLUDED_PREFIXES` | empty, comma separated |
//! | `CALLPROF_DISABLED_OWNERS` | empty, comma separated |
//! | `CALLPROF_DISABLED_OPERATIONS` | empty, comma separated `Owner::operation` |
//! | `CALLPROF_ENDPOINT_PATH` | `/profiler` |
//! | `CALLPROF_ENABLE_BASIC` | `false` |
//! | `CALLPROF_USERNAME` / `CALLPROF_PASSWORD` | empty |
//! | `CALLPROF_LATENCY_WINDOW` | `1000` |
//! | `CALLPROF_THREAD_NAME` | `callprof-drain` |
//! | `CALLPROF_SERVICE_NAME` | `app` |

use crate::error::ConfigError;
use callprof_core::DEFAULT_THREAD_NAME;
#[cfg(feature = "config")]
use serde::Deserialize;
use std::collections::HashSet;

/// Default path of the report endpoint.
pub const DEFAULT_ENDPOINT_PATH: &str = "/profiler";

/// Prefix of every environment variable read by `ProfilerConfig::from_env`.
pub const ENV_PREFIX: &str = "CALLPROF_";

/// Profiler configuration.
///
/// ```ignore
/// use callprof_extras::ProfilerConfig;
///
/// let config = ProfilerConfig::new()
///     .base_prefix("shop::")
///     .exclude_prefix("shop::internal")
///     .endpoint_path("/admin/profiler")
///     .basic_auth("ops", "s3cret");
/// ```
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    pub(crate) enabled: bool,
    pub(crate) base_prefix: String,
    pub(crate) excluded_prefixes: Vec<String>,
    pub(crate) disabled_owners: HashSet<String>,
    pub(crate) disabled_operations: HashSet<String>,
    pub(crate) endpoint_path: String,
    pub(crate) enable_basic: bool,
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) latency_window: usize,
    pub(crate) thread_name: String,
    pub(crate) service_name: String,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfilerConfig {
    /// Create a configuration with default values.
    ///
    /// Defaults:
    /// - Enabled, every owner eligible
    /// - Endpoint at "/profiler", basic auth disabled
    /// - Latency window of 1000 samples per route
    pub fn new() -> Self {
        Self {
            enabled: true,
            base_prefix: String::new(),
            excluded_prefixes: Vec::new(),
            disabled_owners: HashSet::new(),
            disabled_operations: HashSet::new(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            enable_basic: false,
            username: String::new(),
            password: String::new(),
            latency_window: 1000,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            service_name: "app".to_string(),
        }
    }

    /// Turn measurement on or off as a whole.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Only owners whose name starts with `prefix` are measured.
    pub fn base_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.base_prefix = prefix.into();
        self
    }

    /// Never measure owners whose name starts with `prefix`.
    pub fn exclude_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_prefixes.push(prefix.into());
        self
    }

    /// Never measure any operation of `owner`.
    pub fn disable_owner(mut self, owner: impl Into<String>) -> Self {
        self.disabled_owners.insert(owner.into());
        self
    }

    /// Never measure `owner::operation`.
    pub fn disable_operation(
        mut self,
        owner: impl AsRef<str>,
        operation: impl AsRef<str>,
    ) -> Self {
        self.disabled_operations
            .insert(format!("{}::{}", owner.as_ref(), operation.as_ref()));
        self
    }

    /// Path the report endpoint answers on.
    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    /// Require HTTP basic authentication on the report endpoint.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.enable_basic = true;
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Number of recent durations kept per route for percentiles.
    pub fn latency_window(mut self, samples: usize) -> Self {
        self.latency_window = samples;
        self
    }

    /// Name prefix of the drain thread.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Owner name used for requests measured by the tower layer.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Whether measurement is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Path of the report endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint_path
    }

    /// Whether the report endpoint requires basic authentication.
    pub fn requires_auth(&self) -> bool {
        self.enable_basic
    }

    /// Owner name used by the tower layer.
    pub fn service(&self) -> &str {
        &self.service_name
    }

    /// Check that the settings are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "endpoint_path",
                format!("`{}` must start with '/'", self.endpoint_path),
            ));
        }
        if self.latency_window == 0 {
            return Err(ConfigError::invalid(
                "latency_window",
                "must keep at least one sample",
            ));
        }
        if self.enable_basic && self.username.is_empty() {
            return Err(ConfigError::invalid(
                "username",
                "basic authentication is enabled but no username is set",
            ));
        }
        if self.thread_name.is_empty() {
            return Err(ConfigError::invalid("thread_name", "must not be empty"));
        }
        Ok(())
    }
}

/// Shape of the `CALLPROF_*` environment.
#[cfg(feature = "config")]
#[derive(Debug, Deserialize)]
struct EnvSettings {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    base_prefix: String,
    #[serde(default)]
    excluded_prefixes: Vec<String>,
    #[serde(default)]
    disabled_owners: Vec<String>,
    #[serde(default)]
    disabled_operations: Vec<String>,
    #[serde(default = "default_endpoint_path")]
    endpoint_path: String,
    #[serde(default)]
    enable_basic: bool,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default = "default_latency_window")]
    latency_window: usize,
    #[serde(default = "default_thread_name")]
    thread_name: String,
    #[serde(default = "default_service_name")]
    service_name: String,
}

#[cfg(feature = "config")]
fn default_true() -> bool {
    true
}

#[cfg(feature = "config")]
fn default_endpoint_path() -> String {
    DEFAULT_ENDPOINT_PATH.to_string()
}

#[cfg(feature = "config")]
fn default_latency_window() -> usize {
    1000
}

#[cfg(feature = "config")]
fn default_thread_name() -> String {
    DEFAULT_THREAD_NAME.to_string()
}

#[cfg(feature = "config")]
fn default_service_name() -> String {
    "app".to_string()
}

#[cfg(feature = "config")]
impl From<EnvSettings> for ProfilerConfig {
    fn from(env: EnvSettings) -> Self {
        let trimmed = |items: Vec<String>| {
            items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
        };

        Self {
            enabled: env.enabled,
            base_prefix: env.base_prefix,
            excluded_prefixes: trimmed(env.excluded_prefixes),
            disabled_owners: trimmed(env.disabled_owners).into_iter().collect(),
            disabled_operations: trimmed(env.disabled_operations).into_iter().collect(),
            endpoint_path: env.endpoint_path,
            enable_basic: env.enable_basic,
            username: env.username,
            password: env.password,
            latency_window: env.latency_window,
            thread_name: env.thread_name,
            service_name: env.service_name,
        }
    }
}

#[cfg(feature = "config")]
impl ProfilerConfig {
    /// Load configuration from `CALLPROF_*` environment variables.
    ///
    /// Missing variables take their defaults. The result is validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = envy::prefixed(ENV_PREFIX).from_env::<EnvSettings>()?;
        let config = Self::from(settings);
        config.validate()?;
        Ok(config)
    }

    /// Load a `.env` file from the current directory (if any), then read
    /// the environment. Variables already set take precedence.
    pub fn from_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    /// Like [`from_dotenv`](Self::from_dotenv) with an explicit file path.
    pub fn from_dotenv_path(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::from_path(path);
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProfilerConfig::new();
        assert!(config.is_enabled());
        assert_eq!(config.endpoint(), "/profiler");
        assert!(!config.requires_auth());
        assert_eq!(config.latency_window, 1000);
        assert_eq!(config.thread_name, "callprof-drain");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ProfilerConfig::new()
            .base_prefix("shop::")
            .exclude_prefix("shop::internal")
            .disable_owner("shop::Legacy")
            .disable_operation("shop::Users", "export")
            .endpoint_path("/admin/profiler")
            .basic_auth("ops", "s3cret")
            .latency_window(50);

        assert_eq!(config.base_prefix, "shop::");
        assert_eq!(config.excluded_prefixes, vec!["shop::internal"]);
        assert!(config.disabled_owners.contains("shop::Legacy"));
        assert!(config.disabled_operations.contains("shop::Users::export"));
        assert_eq!(config.endpoint(), "/admin/profiler");
        assert!(config.requires_auth());
        assert_eq!(config.latency_window, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let bad_path = ProfilerConfig::new().endpoint_path("profiler");
        assert!(matches!(
            bad_path.validate(),
            Err(ConfigError::Invalid { field: "endpoint_path", .. })
        ));

        let no_window = ProfilerConfig::new().latency_window(0);
        assert!(matches!(
            no_window.validate(),
            Err(ConfigError::Invalid { field: "latency_window", .. })
        ));

        let no_user = ProfilerConfig::new().basic_auth("", "pw");
        assert!(matches!(
            no_user.validate(),
            Err(ConfigError::Invalid { field: "username", .. })
        ));
    }
}
