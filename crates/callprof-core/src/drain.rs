//! Body of the drain thread.

use crate::error::panic_message;
use crate::event::CaptureEvent;
use crate::lifecycle::{Predecessor, RunToken};
use crate::queue::Shared;
use crate::store::AggregateStore;
use crate::tracing_macros::{trace_debug, trace_error, trace_info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Forward events to the store until the run is cancelled.
///
/// The thread of the previous run is joined first, so two runs never
/// ingest at the same time. One bad event never ends the loop: store errors
/// and store panics are logged and the event is dropped.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables, unused_assignments))]
pub(crate) fn run(shared: Arc<Shared>, token: RunToken, predecessor: Predecessor) {
    if predecessor.wait() {
        trace_debug!(run = token.id(), "previous drain thread exited");
    }
    trace_info!(run = token.id(), "capture drain loop started");

    let mut forwarded: u64 = 0;
    while let Some(event) = shared.next_event(&token) {
        forward(shared.store(), event);
        shared.finish_event();
        forwarded += 1;
    }

    trace_info!(
        run = token.id(),
        forwarded,
        left_queued = shared.pending(),
        "capture drain loop stopped"
    );
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn forward(store: &dyn AggregateStore, event: CaptureEvent) {
    let operation = event.operation().clone();
    match panic::catch_unwind(AssertUnwindSafe(|| store.ingest(event))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            trace_error!(
                route = operation.route(),
                handler = %operation.handler_name(),
                error = %err,
                "aggregate store rejected capture event, dropping it"
            );
        }
        Err(payload) => {
            trace_error!(
                route = operation.route(),
                handler = %operation.handler_name(),
                panic = %panic_message(payload.as_ref()),
                "aggregate store panicked while ingesting, dropping event"
            );
        }
    }
}
