//! The interception gate: measure an invocation without changing what the
//! caller sees.
//!
//! Every measured invocation produces exactly one [`CaptureEvent`]:
//!
//! - a normal return is recorded with `failed = false` and the value is
//!   handed back untouched;
//! - an `Err` is recorded with `failed = true` and returned as is (the
//!   default [`ByOutcome`] classification, see [`Classify`]);
//! - a panic is recorded with `failed = true` and keeps unwinding with its
//!   original payload;
//! - an async invocation dropped before it completes is recorded with
//!   `failed = true`.
//!
//! Submission happens in a drop guard, so it runs on every one of those
//! paths after the outcome is known and before control returns to the
//! caller. Submitting cannot fail towards the caller.

use crate::event::{CaptureEvent, Operation, Stopwatch};
use crate::queue::CaptureQueue;
use crate::store::Eligibility;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Classifies the output of a wrapped operation as success or failure.
pub trait Outcome {
    /// Whether the invocation should be recorded as failed.
    fn is_failure(&self) -> bool;
}

impl<T, E> Outcome for Result<T, E> {
    fn is_failure(&self) -> bool {
        self.is_err()
    }
}

impl Outcome for () {
    fn is_failure(&self) -> bool {
        false
    }
}

/// Decides whether a returned value counts as a failed invocation.
///
/// Panics and cancelled futures are failures whatever the classifier says.
/// Any `Fn(&R) -> bool` is a classifier:
///
/// ```
/// use callprof_core::{CaptureQueue, Gate, NullStore, Operation};
///
/// let gate = Gate::new(CaptureQueue::new(NullStore));
/// let op = Operation::new("/status", "Status", "code");
///
/// let code = gate.call_with(&op, |code: &u16| *code >= 500, || 503u16);
/// assert_eq!(code, 503);
/// # gate.queue().shutdown().unwrap();
/// ```
pub trait Classify<R> {
    fn is_failure(&self, output: &R) -> bool;
}

/// Classifies through the output's [`Outcome`] impl. Used by
/// [`Gate::call`], [`Gate::call_async`] and [`Gate::wrap`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ByOutcome;

impl<R: Outcome> Classify<R> for ByOutcome {
    fn is_failure(&self, output: &R) -> bool {
        output.is_failure()
    }
}

/// Only a panic or cancellation is a failure; every returned value is a
/// success. For operations that return plain values.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanicsOnly;

impl<R> Classify<R> for PanicsOnly {
    fn is_failure(&self, _output: &R) -> bool {
        false
    }
}

impl<R, G> Classify<R> for G
where
    G: Fn(&R) -> bool,
{
    fn is_failure(&self, output: &R) -> bool {
        self(output)
    }
}

/// Submits one event when dropped.
///
/// Starts out failed; only [`complete`](Self::complete) can record a normal
/// return, so unwinding and cancellation are recorded as failures.
struct CaptureGuard {
    queue: CaptureQueue,
    operation: Operation,
    stopwatch: Stopwatch,
    failed: bool,
}

impl CaptureGuard {
    fn begin(queue: CaptureQueue, operation: Operation) -> Self {
        Self {
            queue,
            operation,
            stopwatch: Stopwatch::start(),
            failed: true,
        }
    }

    fn complete(mut self, failed: bool) {
        self.failed = failed;
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let (start_ms, end_ms) = self.stopwatch.stop();
        let event = CaptureEvent::new(self.operation.clone(), start_ms, end_ms, self.failed);
        self.queue.submit(event);
    }
}

/// Measures invocations and hands the results to a [`CaptureQueue`].
///
/// ```
/// use callprof_core::{CaptureQueue, Gate, NullStore, Operation};
///
/// let gate = Gate::new(CaptureQueue::new(NullStore));
/// let op = Operation::new("/users/1", "UserController", "get_user");
///
/// let user: Result<u32, String> = gate.call(&op, || Ok(1));
/// assert_eq!(user, Ok(1));
/// # gate.queue().shutdown().unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct Gate {
    queue: CaptureQueue,
}

impl Gate {
    /// Create a gate feeding `queue`.
    pub fn new(queue: CaptureQueue) -> Self {
        Self { queue }
    }

    /// The queue measurements are submitted to.
    pub fn queue(&self) -> &CaptureQueue {
        &self.queue
    }

    /// Run `f` once, measured as `operation`.
    pub fn call<R, F>(&self, operation: &Operation, f: F) -> R
    where
        F: FnOnce() -> R,
        R: Outcome,
    {
        self.call_with(operation, ByOutcome, f)
    }

    /// Run `f` once, measured as `operation`, with `classify` deciding
    /// whether the returned value is a failure.
    pub fn call_with<R, F, C>(&self, operation: &Operation, classify: C, f: F) -> R
    where
        F: FnOnce() -> R,
        C: Classify<R>,
    {
        self.measure(operation, f, |output| classify.is_failure(output))
    }

    fn measure<R>(
        &self,
        operation: &Operation,
        f: impl FnOnce() -> R,
        is_failure: impl FnOnce(&R) -> bool,
    ) -> R {
        let guard = CaptureGuard::begin(self.queue.clone(), operation.clone());
        let output = f();
        guard.complete(is_failure(&output));
        output
    }

    /// Measure `future` as `operation`.
    ///
    /// Timing starts at the first poll. A future that is never polled was
    /// never invoked and produces no event.
    pub fn call_async<F>(&self, operation: &Operation, future: F) -> Profiled<F, ByOutcome>
    where
        F: Future,
        F::Output: Outcome,
    {
        self.call_async_with(operation, ByOutcome, future)
    }

    /// [`call_async`](Self::call_async) with a custom classifier.
    pub fn call_async_with<F, C>(
        &self,
        operation: &Operation,
        classify: C,
        future: F,
    ) -> Profiled<F, C>
    where
        F: Future,
        C: Classify<F::Output>,
    {
        Profiled {
            inner: future,
            pending: Some((self.queue.clone(), operation.clone())),
            guard: None,
            classify: Some(classify),
        }
    }

    /// Wrap `f` so that every call through the returned adapter is
    /// measured as `operation`.
    pub fn wrap<F>(&self, operation: Operation, f: F) -> Instrumented<F> {
        self.wrap_with(operation, ByOutcome, f)
    }

    /// Wrap `f` with a custom classifier. `f` keeps its signature, so a
    /// callable returning a plain value can be wrapped with [`PanicsOnly`].
    pub fn wrap_with<F, C>(&self, operation: Operation, classify: C, f: F) -> Instrumented<F, C> {
        Instrumented {
            inner: f,
            operation,
            gate: Some(self.clone()),
            classify,
        }
    }

    /// Wrap `f` if `eligibility` accepts `operation`, otherwise return a
    /// pass-through adapter that calls `f` without measuring.
    pub fn install<F>(
        &self,
        eligibility: &dyn Eligibility,
        operation: Operation,
        f: F,
    ) -> Instrumented<F> {
        if eligibility.is_eligible(&operation) {
            self.wrap(operation, f)
        } else {
            Instrumented::passthrough(operation, f)
        }
    }
}

/// A callable composed with the gate at registration time.
///
/// Calls take the original argument (use a tuple for several) and return
/// exactly what the inner callable returns. `C` decides which returned
/// values are failures; see [`Classify`].
///
/// ```
/// use callprof_core::{CaptureQueue, Gate, NullStore, Operation};
///
/// let gate = Gate::new(CaptureQueue::new(NullStore));
/// let add = gate.wrap(
///     Operation::new("/add", "Calculator", "add"),
///     |(a, b): (i32, i32)| -> Result<i32, String> { Ok(a + b) },
/// );
///
/// assert_eq!(add.call((2, 3)), Ok(5));
/// # gate.queue().shutdown().unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct Instrumented<F, C = ByOutcome> {
    inner: F,
    operation: Operation,
    gate: Option<Gate>,
    classify: C,
}

impl<F> Instrumented<F> {
    /// Adapter that never measures.
    pub fn passthrough(operation: Operation, f: F) -> Self {
        Self {
            inner: f,
            operation,
            gate: None,
            classify: ByOutcome,
        }
    }
}

impl<F, C> Instrumented<F, C> {
    /// Replace the classifier, keeping the callable and whether it is
    /// measured.
    ///
    /// ```
    /// use callprof_core::{CaptureQueue, Gate, NullStore, Operation, PanicsOnly};
    ///
    /// let gate = Gate::new(CaptureQueue::new(NullStore));
    /// let len = gate
    ///     .wrap(Operation::new("/len", "Text", "len"), |s: &str| s.len())
    ///     .classify_with(PanicsOnly);
    ///
    /// assert_eq!(len.call("abc"), 3);
    /// # gate.queue().shutdown().unwrap();
    /// ```
    pub fn classify_with<C2>(self, classify: C2) -> Instrumented<F, C2> {
        Instrumented {
            inner: self.inner,
            operation: self.operation,
            gate: self.gate,
            classify,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Whether calls through this adapter produce events.
    pub fn is_measured(&self) -> bool {
        self.gate.is_some()
    }

    pub fn into_inner(self) -> F {
        self.inner
    }

    /// Call the inner callable with `args`.
    pub fn call<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
        C: Classify<R>,
    {
        match &self.gate {
            Some(gate) => gate.measure(
                &self.operation,
                || (self.inner)(args),
                |output| self.classify.is_failure(output),
            ),
            None => (self.inner)(args),
        }
    }

    /// Call the inner async callable with `args`.
    pub fn call_async<A, Fut>(&self, args: A) -> Profiled<Fut, C>
    where
        F: Fn(A) -> Fut,
        Fut: Future,
        C: Classify<Fut::Output> + Clone,
    {
        let future = (self.inner)(args);
        match &self.gate {
            Some(gate) => gate.call_async_with(&self.operation, self.classify.clone(), future),
            None => Profiled::unmeasured(future),
        }
    }
}

pin_project! {
    /// Future returned by [`Gate::call_async`].
    ///
    /// Resolves to exactly the inner future's output.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Profiled<F, C> {
        #[pin]
        inner: F,
        pending: Option<(CaptureQueue, Operation)>,
        guard: Option<CaptureGuard>,
        classify: Option<C>,
    }
}

impl<F, C> Profiled<F, C> {
    /// Poll `future` without measuring it.
    pub fn unmeasured(future: F) -> Self {
        Self {
            inner: future,
            pending: None,
            guard: None,
            classify: None,
        }
    }
}

impl<F, C> Future for Profiled<F, C>
where
    F: Future,
    C: Classify<F::Output>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if let Some((queue, operation)) = this.pending.take() {
            *this.guard = Some(CaptureGuard::begin(queue, operation));
        }

        match this.inner.poll(cx) {
            Poll::Ready(output) => {
                if let Some(guard) = this.guard.take() {
                    let failed = this
                        .classify
                        .as_ref()
                        .map_or(false, |classify| classify.is_failure(&output));
                    guard.complete(failed);
                }
                Poll::Ready(output)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
