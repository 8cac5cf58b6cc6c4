//! Seams to the collaborators around the pipeline: where events go, and
//! which operations get measured at all.

use crate::error::Result;
use crate::event::{CaptureEvent, Operation};
use std::sync::Arc;

/// Destination of drained events.
///
/// `ingest` is only ever called from the drain thread of the queue that owns
/// the store, one event at a time. Implementations still need `Sync` because
/// snapshot reads usually come from other threads.
///
/// `ingest` should be fast and must not block indefinitely: while it runs,
/// the queue keeps growing.
pub trait AggregateStore: Send + Sync + 'static {
    /// Take ownership of one event.
    fn ingest(&self, event: CaptureEvent) -> Result<()>;
}

impl<S: AggregateStore + ?Sized> AggregateStore for Arc<S> {
    fn ingest(&self, event: CaptureEvent) -> Result<()> {
        (**self).ingest(event)
    }
}

impl<S: AggregateStore + ?Sized> AggregateStore for Box<S> {
    fn ingest(&self, event: CaptureEvent) -> Result<()> {
        (**self).ingest(event)
    }
}

/// Store that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl AggregateStore for NullStore {
    fn ingest(&self, _event: CaptureEvent) -> Result<()> {
        Ok(())
    }
}

/// Decides whether an operation is measured.
///
/// Consulted once, when the operation is wrapped. The gate itself never
/// second-guesses the answer.
pub trait Eligibility: Send + Sync {
    fn is_eligible(&self, operation: &Operation) -> bool;
}

impl<F> Eligibility for F
where
    F: Fn(&Operation) -> bool + Send + Sync,
{
    fn is_eligible(&self, operation: &Operation) -> bool {
        self(operation)
    }
}

/// Eligibility that measures everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasureAll;

impl Eligibility for MeasureAll {
    fn is_eligible(&self, _operation: &Operation) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_eligibility() {
        let only_users = |op: &Operation| op.route().starts_with("/users");
        assert!(only_users.is_eligible(&Operation::new("/users/1", "U", "get")));
        assert!(!only_users.is_eligible(&Operation::new("/items/1", "I", "get")));
        assert!(MeasureAll.is_eligible(&Operation::new("", "", "")));
    }

    #[test]
    fn test_null_store_accepts() {
        let store: Arc<dyn AggregateStore> = Arc::new(NullStore);
        let event = CaptureEvent::new(Operation::new("/", "R", "index"), 1, 2, false);
        assert!(store.ingest(event).is_ok());
    }
}
