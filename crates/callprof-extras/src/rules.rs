//! Which operations get measured.

use crate::config::ProfilerConfig;
use callprof_core::{Eligibility, Operation};
use std::collections::HashSet;

/// Owner name of the report endpoint; it is never measured.
pub const ENDPOINT_OWNER: &str = "callprof::ProfilerEndpoint";

/// Eligibility rules derived from a [`ProfilerConfig`].
///
/// An operation is measured when all of these hold:
///
/// - profiling is enabled;
/// - it has a route;
/// - its owner starts with the base prefix and with none of the excluded
///   prefixes;
/// - its owner is not the report endpoint;
/// - neither its owner nor the `owner::operation` pair is disabled.
#[derive(Debug, Clone)]
pub struct ScanRules {
    enabled: bool,
    base_prefix: String,
    excluded_prefixes: Vec<String>,
    disabled_owners: HashSet<String>,
    disabled_operations: HashSet<String>,
}

impl ScanRules {
    /// Rules taken from `config`.
    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self {
            enabled: config.enabled,
            base_prefix: config.base_prefix.clone(),
            excluded_prefixes: config.excluded_prefixes.clone(),
            disabled_owners: config.disabled_owners.clone(),
            disabled_operations: config.disabled_operations.clone(),
        }
    }

    /// Whether `owner` passes the owner-level rules.
    pub fn owner_eligible(&self, owner: &str) -> bool {
        self.enabled
            && owner.starts_with(&self.base_prefix)
            && owner != ENDPOINT_OWNER
            && !self
                .excluded_prefixes
                .iter()
                .any(|prefix| owner.starts_with(prefix.as_str()))
            && !self.disabled_owners.contains(owner)
    }
}

impl Default for ScanRules {
    fn default() -> Self {
        Self::from_config(&ProfilerConfig::default())
    }
}

impl Eligibility for ScanRules {
    fn is_eligible(&self, operation: &Operation) -> bool {
        !operation.route().is_empty()
            && self.owner_eligible(operation.owner())
            && !self.disabled_operations.contains(&operation.handler_name())
    }
}
