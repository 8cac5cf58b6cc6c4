//! # callprof
//!
//! Low-overhead call profiling for Rust services.
//!
//! Every instrumented invocation is timed on the caller's thread and handed
//! to an in-process queue; a single background thread forwards the
//! measurements to an aggregate store. The caller only pays for taking two
//! timestamps and one enqueue, and always gets back exactly what the
//! operation returned, errors and panics included.
//!
//! ## Quick Start
//!
//! ```
//! use callprof::prelude::*;
//! use std::time::Duration;
//!
//! let profiler = Profiler::new(ProfilerConfig::new()).unwrap();
//!
//! let get_user = profiler.instrument(
//!     Operation::new("/users/{id}", "UserController", "get_user"),
//!     |id: u64| -> Result<String, String> { Ok(format!("user {}", id)) },
//! );
//!
//! assert_eq!(get_user.call(1), Ok("user 1".to_string()));
//!
//! assert!(profiler.queue().wait_idle(Duration::from_secs(5)));
//! let report = profiler.snapshot();
//! assert_eq!(report.route("/users/{id}").unwrap().count, 1);
//! profiler.shutdown().unwrap();
//! ```
//!
//! ## Optional Features
//!
//! - `tracing` (default) - Log pipeline lifecycle and internal failures
//! - `extras` - Aggregate store, eligibility rules and report endpoint
//! - `config` (default) - Load configuration from `CALLPROF_*` environment
//!   variables and `.env` files
//! - `layer` (default) - Tower layer for HTTP services
//! - `full` - All optional features enabled
//!
//! ```toml
//! [dependencies]
//! callprof = { version = "0.1", default-features = false, features = ["extras"] }
//! ```

// Re-export the capture pipeline
pub use callprof_core::*;

// Re-export extras (feature-gated)
#[cfg(feature = "extras")]
pub use callprof_extras::{
    AuthError, BasicCredentials, ConfigError, InMemoryAggregateStore, OwnerStats,
    ProfileSnapshot, Profiler, ProfilerConfig, ProfilerEndpoint, RouteStats, ScanRules,
    AUTHENTICATE_CHALLENGE, DEFAULT_ENDPOINT_PATH, ENDPOINT_OWNER, ENV_PREFIX,
};

#[cfg(feature = "extras")]
pub use callprof_extras::config;

#[cfg(feature = "layer")]
pub use callprof_extras::layer;
#[cfg(feature = "layer")]
pub use callprof_extras::{MatchedRoute, ProfiledBody, ProfilerLayer, ProfilerService};

pub use tracing;

/// Prelude module - import everything you need with `use callprof::prelude::*`
pub mod prelude {
    pub use callprof_core::{
        AggregateStore, CaptureEvent, CaptureQueue, Classify, Eligibility, Gate, Instrumented,
        MeasureAll, NullStore, Operation, Outcome, PanicsOnly,
    };

    #[cfg(feature = "extras")]
    pub use callprof_extras::{
        InMemoryAggregateStore, ProfileSnapshot, Profiler, ProfilerConfig, ProfilerEndpoint,
        RouteStats, ScanRules,
    };

    #[cfg(feature = "layer")]
    pub use callprof_extras::{MatchedRoute, ProfilerLayer};
}
