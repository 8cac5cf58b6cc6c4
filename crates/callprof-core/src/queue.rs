//! The capture queue: an unbounded FIFO between the threads running
//! instrumented operations and the single drain thread.
//!
//! # Capacity
//!
//! The buffer has no bound. If the aggregate store falls behind, pending
//! events accumulate in memory rather than being dropped or slowing the
//! callers down. [`CaptureQueue::pending`] exposes the backlog so operators
//! can watch for it.

use crate::drain;
use crate::error::{panic_message, CaptureError, Result};
use crate::event::CaptureEvent;
use crate::lifecycle::{Lifecycle, Started};
use crate::store::AggregateStore;
use crate::tracing_macros::{trace_error, trace_info, trace_warn};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Default name of the drain thread.
pub const DEFAULT_THREAD_NAME: &str = "callprof-drain";

#[derive(Default)]
struct Buffer {
    events: VecDeque<CaptureEvent>,
    /// Events popped by the drain thread but not yet forwarded.
    in_flight: usize,
}

impl Buffer {
    fn is_idle(&self) -> bool {
        self.events.is_empty() && self.in_flight == 0
    }
}

/// State shared by every queue handle and the drain thread.
pub(crate) struct Shared {
    buffer: Mutex<Buffer>,
    available: Condvar,
    idle: Condvar,
    store: Arc<dyn AggregateStore>,
    lifecycle: Lifecycle,
    thread_name: String,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn store(&self) -> &dyn AggregateStore {
        self.store.as_ref()
    }

    pub(crate) fn pending(&self) -> usize {
        self.lock().events.len()
    }

    /// Block until an event is available or the run is cancelled.
    pub(crate) fn next_event(&self, token: &crate::lifecycle::RunToken) -> Option<CaptureEvent> {
        let mut buffer = self.lock();
        loop {
            if !token.should_continue() {
                return None;
            }
            if let Some(event) = buffer.events.pop_front() {
                buffer.in_flight += 1;
                return Some(event);
            }
            buffer = self
                .available
                .wait(buffer)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Mark the event returned by the last `next_event` as forwarded.
    pub(crate) fn finish_event(&self) {
        let mut buffer = self.lock();
        buffer.in_flight = buffer.in_flight.saturating_sub(1);
        if buffer.is_idle() {
            self.idle.notify_all();
        }
    }

    /// Wake a drain thread blocked in `next_event`.
    fn interrupt(&self) {
        // Taking the lock orders this wake-up after any token check the
        // drain thread is doing under the same lock.
        drop(self.lock());
        self.available.notify_all();
    }
}

/// Builder for a [`CaptureQueue`].
pub struct QueueBuilder {
    store: Arc<dyn AggregateStore>,
    thread_name: String,
}

impl QueueBuilder {
    /// Name given to every drain thread this queue spawns.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn build(self) -> CaptureQueue {
        CaptureQueue {
            shared: Arc::new(Shared {
                buffer: Mutex::new(Buffer::default()),
                available: Condvar::new(),
                idle: Condvar::new(),
                store: self.store,
                lifecycle: Lifecycle::new(),
                thread_name: self.thread_name,
            }),
        }
    }
}

/// Multi-producer, single-consumer hand-off between instrumented calls and
/// the aggregate store.
///
/// Handles are cheap to clone and all refer to the same buffer and drain
/// thread. The drain thread starts on the first [`submit`](Self::submit)
/// and keeps running until [`stop`](Self::stop) or
/// [`shutdown`](Self::shutdown); a later submit starts a new one.
///
/// # Example
///
/// ```
/// use callprof_core::{CaptureEvent, CaptureQueue, NullStore, Operation};
/// use std::time::Duration;
///
/// let queue = CaptureQueue::new(NullStore);
/// queue.submit(CaptureEvent::new(Operation::new("/", "Home", "index"), 0, 1, false));
/// assert!(queue.wait_idle(Duration::from_secs(5)));
/// queue.shutdown().unwrap();
/// ```
#[derive(Clone)]
pub struct CaptureQueue {
    shared: Arc<Shared>,
}

impl CaptureQueue {
    /// Create a queue that drains into `store`.
    pub fn new<S: AggregateStore>(store: S) -> Self {
        Self::builder(Arc::new(store)).build()
    }

    /// Start configuring a queue around a shared store.
    pub fn builder(store: Arc<dyn AggregateStore>) -> QueueBuilder {
        QueueBuilder {
            store,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Append an event, starting the drain thread if it is not running.
    ///
    /// Never fails and never panics. If the drain thread cannot be spawned
    /// the event stays buffered and the failure is logged; the next submit
    /// tries again.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn submit(&self, event: CaptureEvent) {
        if !self.shared.lifecycle.is_started() {
            if let Err(err) = self.start() {
                trace_warn!(
                    error = %err,
                    pending = self.pending() + 1,
                    "capture event buffered without a running drain thread"
                );
            }
        }

        self.shared.lock().events.push_back(event);
        self.shared.available.notify_one();
    }

    /// Start the drain thread.
    ///
    /// Returns `Ok(true)` when this call spawned the thread and `Ok(false)`
    /// when one was already running. Concurrent callers spawn exactly one
    /// thread between them. Never waits for the thread of a stopped run;
    /// the new thread does that before it starts draining.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn start(&self) -> Result<bool> {
        let shared = self.shared.clone();
        let started = self.shared.lifecycle.start(move |token, predecessor| {
            let name = format!("{}-{}", shared.thread_name, token.id());
            thread::Builder::new()
                .name(name)
                .spawn(move || drain::run(shared, token, predecessor))
        });

        match started {
            Ok(Started::Spawned(run)) => {
                trace_info!(run, "capture queue started");
                Ok(true)
            }
            Ok(Started::AlreadyRunning) => Ok(false),
            Err(err) => {
                trace_error!(
                    error = %err,
                    "failed to spawn capture drain thread, measurements will not reach the store"
                );
                Err(CaptureError::Spawn(err))
            }
        }
    }

    /// Stop the drain thread.
    ///
    /// Idempotent. The thread is woken if it is waiting and exits without
    /// draining what is left; those events are picked up by the next run.
    /// Does not wait for the thread to exit, see [`shutdown`](Self::shutdown).
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn stop(&self) {
        if let Some(run) = self.shared.lifecycle.stop() {
            self.shared.interrupt();
            trace_info!(run, pending = self.pending(), "capture queue stopped");
        }
    }

    /// Stop the drain thread and wait for it to exit, along with any
    /// earlier thread it was still waiting on.
    pub fn shutdown(&self) -> Result<()> {
        self.stop();
        match self.shared.lifecycle.take_retired() {
            Some(handle) if handle.thread().id() != thread::current().id() => handle
                .join()
                .map_err(|payload| CaptureError::DrainPanicked(panic_message(payload.as_ref()))),
            _ => Ok(()),
        }
    }

    /// Block until every submitted event has been forwarded, or `timeout`
    /// elapses. Returns `true` when the queue went idle.
    ///
    /// With no drain thread running and events pending this can only time
    /// out.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut buffer = self.shared.lock();
        while !buffer.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .idle
                .wait_timeout(buffer, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            buffer = guard;
        }
        true
    }

    /// Number of events waiting to be drained.
    pub fn pending(&self) -> usize {
        self.shared.pending()
    }

    /// Whether a drain thread is currently running.
    pub fn is_running(&self) -> bool {
        self.shared.lifecycle.is_started()
    }

    /// Number of drain threads spawned over the queue's lifetime.
    pub fn runs_started(&self) -> u64 {
        self.shared.lifecycle.runs_started()
    }

    /// The store this queue drains into.
    pub fn store(&self) -> &Arc<dyn AggregateStore> {
        &self.shared.store
    }
}

impl std::fmt::Debug for CaptureQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureQueue")
            .field("thread_name", &self.shared.thread_name)
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .field("runs_started", &self.runs_started())
            .finish()
    }
}
