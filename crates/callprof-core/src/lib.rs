//! # callprof-core
//!
//! The capture pipeline of callprof.
//!
//! An instrumented operation runs through a [`Gate`], which times it and
//! builds one [`CaptureEvent`] per invocation. Events are handed to a
//! [`CaptureQueue`] and forwarded, one at a time and in submission order,
//! to an [`AggregateStore`] by a single background thread. That thread is
//! started by the first submission and can be stopped and restarted.
//!
//! ```text
//! caller ──► Gate ──► CaptureQueue ══► drain thread ──► AggregateStore
//!             │  (unbounded FIFO)
//!             └─ original result / error / panic back to the caller
//! ```
//!
//! Instrumentation never changes what the caller observes: results and
//! errors come back untouched, panics keep unwinding with their original
//! payload, and failures inside the pipeline are logged and discarded.
//!
//! ## Example
//!
//! ```
//! use callprof_core::{CaptureQueue, Gate, NullStore, Operation};
//! use std::time::Duration;
//!
//! let queue = CaptureQueue::new(NullStore);
//! let gate = Gate::new(queue.clone());
//!
//! let get_user = gate.wrap(
//!     Operation::new("/users/{id}", "UserController", "get_user"),
//!     |id: u64| -> Result<String, String> { Ok(format!("user {}", id)) },
//! );
//!
//! assert_eq!(get_user.call(1), Ok("user 1".to_string()));
//! assert!(queue.wait_idle(Duration::from_secs(5)));
//! queue.shutdown().unwrap();
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): log pipeline lifecycle and internal failures
//!   through the `tracing` crate.

mod drain;
mod error;
mod event;
mod gate;
mod lifecycle;
mod queue;
mod store;
mod tracing_macros;

pub use error::{CaptureError, Result};
pub use event::{CaptureEvent, Operation};
pub use gate::{ByOutcome, Classify, Gate, Instrumented, Outcome, PanicsOnly, Profiled};
pub use queue::{CaptureQueue, QueueBuilder, DEFAULT_THREAD_NAME};
pub use store::{AggregateStore, Eligibility, MeasureAll, NullStore};
