//! The assembled profiler: configuration, store, queue, gate and rules.

use crate::config::ProfilerConfig;
use crate::endpoint::ProfilerEndpoint;
use crate::error::ConfigError;
use crate::rules::ScanRules;
use crate::stats::ProfileSnapshot;
use crate::store::InMemoryAggregateStore;
use callprof_core::{CaptureQueue, Gate, Instrumented, Operation};
use std::sync::Arc;

/// Everything needed to profile an application, wired together.
///
/// Cloning is cheap and every clone shares the same queue and store.
///
/// ```ignore
/// use callprof_extras::{Profiler, ProfilerConfig};
/// use callprof_core::Operation;
///
/// let profiler = Profiler::new(ProfilerConfig::new().base_prefix("shop::"))?;
/// let get_user = profiler.instrument(
///     Operation::new("/users/{id}", "shop::Users", "get_user"),
///     |id: u64| -> Result<u64, String> { Ok(id) },
/// );
///
/// get_user.call(1)?;
/// let report = profiler.snapshot();
/// profiler.shutdown()?;
/// ```
#[derive(Debug, Clone)]
pub struct Profiler {
    config: Arc<ProfilerConfig>,
    store: Arc<InMemoryAggregateStore>,
    rules: Arc<ScanRules>,
    gate: Gate,
}

impl Profiler {
    /// Validate `config` and build a profiler from it.
    ///
    /// The drain thread is not started until the first measured call.
    pub fn new(config: ProfilerConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Arc::new(InMemoryAggregateStore::new(config.latency_window));
        let queue = CaptureQueue::builder(store.clone())
            .thread_name(config.thread_name.clone())
            .build();
        let rules = ScanRules::from_config(&config);

        tracing::debug!(
            enabled = config.enabled,
            endpoint = %config.endpoint_path,
            basic_auth = config.enable_basic,
            "profiler configured"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            rules: Arc::new(rules),
            gate: Gate::new(queue),
        })
    }

    /// Build a profiler from `CALLPROF_*` environment variables.
    #[cfg(feature = "config")]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(ProfilerConfig::from_env()?)
    }

    /// Wrap `f` as `operation`, measured only if the rules accept it.
    pub fn instrument<F>(&self, operation: Operation, f: F) -> Instrumented<F> {
        let instrumented = self.gate.install(self.rules.as_ref(), operation, f);
        if !instrumented.is_measured() {
            tracing::debug!(
                handler = %instrumented.operation().handler_name(),
                "operation not eligible for profiling"
            );
        }
        instrumented
    }

    /// Configuration the profiler was built from.
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Gate measured calls run through.
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Queue feeding the store.
    pub fn queue(&self) -> &CaptureQueue {
        self.gate.queue()
    }

    /// Eligibility rules.
    pub fn rules(&self) -> &ScanRules {
        &self.rules
    }

    /// Aggregate store.
    pub fn store(&self) -> &Arc<InMemoryAggregateStore> {
        &self.store
    }

    /// Current aggregate view. Events still queued are not included.
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.store.snapshot()
    }

    /// Report endpoint serving this profiler's store.
    pub fn endpoint(&self) -> ProfilerEndpoint {
        ProfilerEndpoint::new(&self.config, self.store.clone())
    }

    /// Tower layer measuring an HTTP service with this profiler.
    #[cfg(feature = "layer")]
    pub fn layer(&self) -> crate::layer::ProfilerLayer {
        crate::layer::ProfilerLayer::new(self.clone())
    }

    /// Stop the drain thread and wait for it to exit.
    ///
    /// Events still queued stay queued; the next measured call starts a
    /// new drain thread.
    pub fn shutdown(&self) -> callprof_core::Result<()> {
        self.queue().shutdown()
    }
}
