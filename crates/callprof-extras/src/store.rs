//! In-memory aggregate store.

use crate::stats::{OwnerCounts, ProfileSnapshot, RouteAccumulator, RouteStats};
use callprof_core::{AggregateStore, CaptureEvent};
use dashmap::DashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Aggregate store keeping per-route and per-owner statistics in memory.
///
/// Writes come from the drain thread only; [`snapshot`](Self::snapshot)
/// can be called from any thread while ingestion continues. Nothing is
/// persisted.
#[derive(Debug)]
pub struct InMemoryAggregateStore {
    routes: DashMap<String, RouteAccumulator>,
    owners: DashMap<String, OwnerCounts>,
    window: usize,
    since: Mutex<Instant>,
}

impl InMemoryAggregateStore {
    /// Create a store keeping `window` recent durations per route.
    pub fn new(window: usize) -> Self {
        Self {
            routes: DashMap::new(),
            owners: DashMap::new(),
            window: window.max(1),
            since: Mutex::new(Instant::now()),
        }
    }

    /// Current aggregate view.
    pub fn snapshot(&self) -> ProfileSnapshot {
        let uptime_secs = self
            .since
            .lock()
            .map(|since| since.elapsed().as_secs())
            .unwrap_or_default();

        ProfileSnapshot::assemble(
            uptime_secs,
            self.routes
                .iter()
                .map(|entry| entry.value().summarize(entry.key())),
            self.owners
                .iter()
                .map(|entry| entry.value().summarize(entry.key())),
        )
    }

    /// Statistics of one route.
    pub fn route(&self, route: &str) -> Option<RouteStats> {
        self.routes.get(route).map(|acc| acc.summarize(route))
    }

    /// Number of distinct routes seen.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Forget everything aggregated so far.
    pub fn reset(&self) {
        self.routes.clear();
        self.owners.clear();
        if let Ok(mut since) = self.since.lock() {
            *since = Instant::now();
        }
        tracing::info!("profiler statistics reset");
    }
}

impl Default for InMemoryAggregateStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl AggregateStore for InMemoryAggregateStore {
    fn ingest(&self, event: CaptureEvent) -> callprof_core::Result<()> {
        match self.routes.get_mut(event.route()) {
            Some(mut acc) => acc.record(&event),
            None => self
                .routes
                .entry(event.route().to_string())
                .or_insert_with(|| RouteAccumulator::new(self.window))
                .record(&event),
        }

        match self.owners.get_mut(event.owner()) {
            Some(mut counts) => counts.record(&event),
            None => self
                .owners
                .entry(event.owner().to_string())
                .or_default()
                .record(&event),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callprof_core::Operation;

    fn event(route: &str, owner: &str, op: &str, duration: u64, failed: bool) -> CaptureEvent {
        CaptureEvent::new(Operation::new(route, owner, op), 500, 500 + duration, failed)
    }

    #[test]
    fn test_ingest_and_snapshot() {
        let store = InMemoryAggregateStore::new(100);
        store
            .ingest(event("/users/1", "UserController", "get_user", 5, false))
            .unwrap();
        store
            .ingest(event("/users/1", "UserController", "get_user", 15, true))
            .unwrap();
        store
            .ingest(event("/health", "Health", "ping", 1, false))
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.total_calls, 3);
        assert_eq!(snapshot.total_failures, 1);
        assert_eq!(snapshot.routes.len(), 2);
        assert_eq!(snapshot.routes[0].route, "/users/1");
        assert_eq!(snapshot.routes[0].avg_ms, 10.0);
        assert_eq!(snapshot.owners.len(), 2);

        let users = store.route("/users/1").unwrap();
        assert_eq!(users.count, 2);
        assert_eq!(users.failures, 1);
        assert!(users.handlers.contains("UserController::get_user"));
    }

    #[test]
    fn test_reset_clears() {
        let store = InMemoryAggregateStore::default();
        store.ingest(event("/a", "A", "a", 1, false)).unwrap();
        assert_eq!(store.route_count(), 1);

        store.reset();
        assert_eq!(store.route_count(), 0);
        assert_eq!(store.snapshot(), ProfileSnapshot::default());
    }

    #[test]
    fn test_matches_batch_aggregation() {
        let events: Vec<CaptureEvent> = (0..50)
            .map(|i| event(&format!("/r{}", i % 3), "Svc", "op", i, i % 7 == 0))
            .collect();

        let store = InMemoryAggregateStore::new(10);
        for e in &events {
            store.ingest(e.clone()).unwrap();
        }

        let live = store.snapshot();
        let batch = ProfileSnapshot::from_events(&events, 10);
        assert_eq!(live.routes, batch.routes);
        assert_eq!(live.owners, batch.owners);
        assert_eq!(live.total_calls, 50);
    }
}
