//! Capture events and the operation descriptors they are built from.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Identity of an instrumented operation.
///
/// Built once when the operation is registered and cloned into every
/// [`CaptureEvent`] it produces. Cloning is a single reference-count bump.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Operation {
    inner: Arc<Descriptor>,
}

#[derive(PartialEq, Eq, Hash)]
struct Descriptor {
    route: String,
    owner: String,
    operation: String,
}

impl Operation {
    /// Describe an operation by its route key, declaring type and name.
    ///
    /// ```
    /// use callprof_core::Operation;
    ///
    /// let op = Operation::new("/users/{id}", "UserController", "get_user");
    /// assert_eq!(op.handler_name(), "UserController::get_user");
    /// ```
    pub fn new(
        route: impl Into<String>,
        owner: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Descriptor {
                route: route.into(),
                owner: owner.into(),
                operation: operation.into(),
            }),
        }
    }

    /// Route key (route template or operation name).
    pub fn route(&self) -> &str {
        &self.inner.route
    }

    /// Type that declares the operation.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    /// Name of the operation itself.
    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    /// `owner::operation`
    pub fn handler_name(&self) -> String {
        format!("{}::{}", self.inner.owner, self.inner.operation)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("route", &self.inner.route)
            .field("owner", &self.inner.owner)
            .field("operation", &self.inner.operation)
            .finish()
    }
}

/// Record of one completed or failed invocation.
///
/// Fields are private: an event cannot change once built, so the producer
/// that created it and the drain thread that forwards it never share write
/// access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    start_ms: u64,
    end_ms: u64,
    operation: Operation,
    failed: bool,
}

impl CaptureEvent {
    /// Build an event from explicit wall-clock timestamps (milliseconds since
    /// the Unix epoch). An `end_ms` earlier than `start_ms` is clamped to
    /// `start_ms`.
    pub fn new(operation: Operation, start_ms: u64, end_ms: u64, failed: bool) -> Self {
        Self {
            start_ms,
            end_ms: end_ms.max(start_ms),
            operation,
            failed,
        }
    }

    /// Wall-clock start in milliseconds since the Unix epoch.
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    /// Wall-clock end in milliseconds since the Unix epoch.
    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    /// `end - start` in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms())
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn route(&self) -> &str {
        self.operation.route()
    }

    pub fn owner(&self) -> &str {
        self.operation.owner()
    }

    pub fn operation_name(&self) -> &str {
        self.operation.operation()
    }

    /// Whether the invocation ended in an error, a panic or cancellation.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl Serialize for CaptureEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CaptureEvent", 6)?;
        state.serialize_field("start", &self.start_ms)?;
        state.serialize_field("end", &self.end_ms)?;
        state.serialize_field("route", self.route())?;
        state.serialize_field("owner", self.owner())?;
        state.serialize_field("operation", self.operation_name())?;
        state.serialize_field("failed", &self.failed)?;
        state.end()
    }
}

/// Times one invocation.
///
/// The wall-clock reading anchors the event on the timeline; the end is
/// derived from a monotonic clock so a clock step during the call cannot
/// produce `end < start`.
pub(crate) struct Stopwatch {
    start_ms: u64,
    started: Instant,
}

impl Stopwatch {
    pub(crate) fn start() -> Self {
        let start_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            start_ms,
            started: Instant::now(),
        }
    }

    /// Returns `(start_ms, end_ms)`.
    pub(crate) fn stop(&self) -> (u64, u64) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        (self.start_ms, self.start_ms.saturating_add(elapsed))
    }
}
