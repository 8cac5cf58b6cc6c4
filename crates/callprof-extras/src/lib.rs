//! # callprof-extras
//!
//! Everything around the callprof capture pipeline: an in-memory aggregate
//! store with per-route statistics, eligibility rules, configuration, and a
//! report endpoint optionally protected by HTTP basic authentication.
//!
//! ## Features
//!
//! - `config` (default) - Load [`ProfilerConfig`] from `CALLPROF_*`
//!   environment variables and `.env` files
//! - `layer` (default) - Tower layer measuring an HTTP service and serving
//!   the report endpoint
//!
//! ## Example
//!
//! ```
//! use callprof_core::Operation;
//! use callprof_extras::{Profiler, ProfilerConfig};
//! use std::time::Duration;
//!
//! let profiler = Profiler::new(ProfilerConfig::new()).unwrap();
//! let get_user = profiler.instrument(
//!     Operation::new("/users/{id}", "UserController", "get_user"),
//!     |id: u64| -> Result<u64, String> { Ok(id) },
//! );
//!
//! assert_eq!(get_user.call(7), Ok(7));
//! assert!(profiler.queue().wait_idle(Duration::from_secs(5)));
//! assert_eq!(profiler.snapshot().total_calls, 1);
//! profiler.shutdown().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod auth;
pub mod config;
mod endpoint;
mod error;
mod profiler;
mod rules;
mod stats;
mod store;

#[cfg(feature = "layer")]
pub mod layer;

pub use auth::BasicCredentials;
pub use config::{ProfilerConfig, DEFAULT_ENDPOINT_PATH, ENV_PREFIX};
pub use endpoint::{ProfilerEndpoint, AUTHENTICATE_CHALLENGE};
pub use error::{AuthError, ConfigError};
pub use profiler::Profiler;
pub use rules::{ScanRules, ENDPOINT_OWNER};
pub use stats::{OwnerStats, ProfileSnapshot, RouteStats};
pub use store::InMemoryAggregateStore;

#[cfg(feature = "layer")]
pub use layer::{MatchedRoute, ProfiledBody, ProfilerLayer, ProfilerService};
