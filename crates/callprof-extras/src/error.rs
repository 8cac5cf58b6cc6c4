//! Error types for callprof-extras

/// Configuration loading or validation failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable deserialization failed.
    #[cfg(feature = "config")]
    #[error("Configuration error: {0}")]
    Env(#[from] envy::Error),

    /// A value was present but unusable.
    #[error("Invalid configuration value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending setting
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Why a request to the report endpoint was not authorized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header.
    #[error("missing Authorization header")]
    Missing,

    /// Header present but too short or not valid text.
    #[error("malformed Authorization header")]
    Malformed,

    /// Credentials were not valid base64.
    #[error("credentials are not valid base64")]
    Encoding,

    /// Decoded credentials did not match the configured ones.
    #[error("invalid credentials")]
    Mismatch,
}
