//! Aggregated statistics built from capture events.

use callprof_core::CaptureEvent;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Statistics for one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStats {
    /// Route key
    pub route: String,

    /// Number of measured calls
    pub count: u64,

    /// Calls that ended in an error, panic or cancellation
    pub failures: u64,

    /// Sum of all durations in milliseconds
    pub total_ms: u64,

    /// Fastest call in milliseconds
    pub min_ms: u64,

    /// Slowest call in milliseconds
    pub max_ms: u64,

    /// Mean duration in milliseconds
    pub avg_ms: f64,

    /// 95th percentile over the latency window
    pub p95_ms: u64,

    /// 99th percentile over the latency window
    pub p99_ms: u64,

    /// Earliest start seen (ms since the Unix epoch)
    pub first_access_ms: u64,

    /// Latest end seen (ms since the Unix epoch)
    pub last_access_ms: u64,

    /// `Owner::operation` names that served this route
    pub handlers: BTreeSet<String>,
}

impl RouteStats {
    /// Fraction of calls that failed, 0.0 when there were none.
    pub fn failure_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.failures as f64 / self.count as f64
        }
    }
}

/// Call counts for one declaring type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerStats {
    /// Owner name
    pub owner: String,
    /// Number of measured calls
    pub count: u64,
    /// Failed calls
    pub failures: u64,
}

/// Point-in-time view of everything the store has aggregated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Seconds since the store was created or last reset
    pub uptime_secs: u64,

    /// Total measured calls
    pub total_calls: u64,

    /// Total failed calls
    pub total_failures: u64,

    /// Per-route statistics, slowest average first
    pub routes: Vec<RouteStats>,

    /// Per-owner counts, by owner name
    pub owners: Vec<OwnerStats>,
}

impl ProfileSnapshot {
    /// Aggregate a batch of events directly, keeping `window` samples per
    /// route for percentiles.
    pub fn from_events(events: &[CaptureEvent], window: usize) -> Self {
        let mut routes: BTreeMap<String, RouteAccumulator> = BTreeMap::new();
        let mut owners: BTreeMap<String, OwnerCounts> = BTreeMap::new();

        for event in events {
            routes
                .entry(event.route().to_string())
                .or_insert_with(|| RouteAccumulator::new(window))
                .record(event);
            owners
                .entry(event.owner().to_string())
                .or_default()
                .record(event);
        }

        Self::assemble(
            0,
            routes.iter().map(|(route, acc)| acc.summarize(route)),
            owners.iter().map(|(owner, counts)| counts.summarize(owner)),
        )
    }

    pub(crate) fn assemble(
        uptime_secs: u64,
        routes: impl IntoIterator<Item = RouteStats>,
        owners: impl IntoIterator<Item = OwnerStats>,
    ) -> Self {
        let mut routes: Vec<RouteStats> = routes.into_iter().collect();
        routes.sort_by(|a, b| {
            b.avg_ms
                .total_cmp(&a.avg_ms)
                .then_with(|| a.route.cmp(&b.route))
        });

        let mut owners: Vec<OwnerStats> = owners.into_iter().collect();
        owners.sort_by(|a, b| a.owner.cmp(&b.owner));

        Self {
            uptime_secs,
            total_calls: routes.iter().map(|r| r.count).sum(),
            total_failures: routes.iter().map(|r| r.failures).sum(),
            routes,
            owners,
        }
    }

    /// Statistics of one route, if it has been seen.
    pub fn route(&self, route: &str) -> Option<&RouteStats> {
        self.routes.iter().find(|r| r.route == route)
    }
}

/// Running totals for one route.
#[derive(Debug, Clone)]
pub(crate) struct RouteAccumulator {
    count: u64,
    failures: u64,
    total_ms: u64,
    min_ms: u64,
    max_ms: u64,
    first_access_ms: u64,
    last_access_ms: u64,
    window: VecDeque<u64>,
    capacity: usize,
    handlers: BTreeSet<String>,
}

impl RouteAccumulator {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            count: 0,
            failures: 0,
            total_ms: 0,
            min_ms: u64::MAX,
            max_ms: 0,
            first_access_ms: u64::MAX,
            last_access_ms: 0,
            window: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            handlers: BTreeSet::new(),
        }
    }

    pub(crate) fn record(&mut self, event: &CaptureEvent) {
        let duration = event.duration_ms();

        self.count += 1;
        if event.failed() {
            self.failures += 1;
        }
        self.total_ms = self.total_ms.saturating_add(duration);
        self.min_ms = self.min_ms.min(duration);
        self.max_ms = self.max_ms.max(duration);
        self.first_access_ms = self.first_access_ms.min(event.start_ms());
        self.last_access_ms = self.last_access_ms.max(event.end_ms());

        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(duration);

        let operation = event.operation();
        if !self
            .handlers
            .iter()
            .any(|h| is_handler(h, operation.owner(), operation.operation()))
        {
            self.handlers.insert(operation.handler_name());
        }
    }

    pub(crate) fn summarize(&self, route: &str) -> RouteStats {
        let mut sorted: Vec<u64> = self.window.iter().copied().collect();
        sorted.sort_unstable();

        let empty = self.count == 0;
        RouteStats {
            route: route.to_string(),
            count: self.count,
            failures: self.failures,
            total_ms: self.total_ms,
            min_ms: if empty { 0 } else { self.min_ms },
            max_ms: self.max_ms,
            avg_ms: if empty {
                0.0
            } else {
                self.total_ms as f64 / self.count as f64
            },
            p95_ms: percentile(&sorted, 95),
            p99_ms: percentile(&sorted, 99),
            first_access_ms: if empty { 0 } else { self.first_access_ms },
            last_access_ms: self.last_access_ms,
            handlers: self.handlers.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct OwnerCounts {
    count: u64,
    failures: u64,
}

impl OwnerCounts {
    pub(crate) fn record(&mut self, event: &CaptureEvent) {
        self.count += 1;
        if event.failed() {
            self.failures += 1;
        }
    }

    pub(crate) fn summarize(&self, owner: &str) -> OwnerStats {
        OwnerStats {
            owner: owner.to_string(),
            count: self.count,
            failures: self.failures,
        }
    }
}

fn is_handler(name: &str, owner: &str, operation: &str) -> bool {
    name.len() == owner.len() + 2 + operation.len()
        && name.starts_with(owner)
        && name.ends_with(operation)
        && name.as_bytes()[owner.len()..owner.len() + 2] == *b"::"
}

/// Nearest-rank percentile of a sorted slice.
fn percentile(sorted: &[u64], n: u8) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = (sorted.len() as f64 * (n as f64 / 100.0)).ceil() as usize;
    sorted[idx.saturating_sub(1).min(sorted.len() - 1)]
}
