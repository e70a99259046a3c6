//! Forwarding statistics.
//!
//! Counters are updated by the table and the route dispatcher from whichever
//! thread happens to be forwarding, so all fields are atomics read without
//! locking. A [`StatsSnapshot`] is what gets reported.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Live counters for one virtual reassembly buffer.
#[derive(Debug, Default)]
pub struct VrbStats {
    /// Entries created.
    pub created: AtomicU64,
    /// Interval chains merged into existing entries.
    pub merged: AtomicU64,
    /// `add` calls rejected because the table was full.
    pub full: AtomicU64,
    /// Entries freed by the collector.
    pub evicted: AtomicU64,
    /// Entries removed explicitly.
    pub removed: AtomicU64,
    /// Successful `get`/`reverse` lookups.
    pub lookup_hits: AtomicU64,
    /// Failed `get`/`reverse` lookups.
    pub lookup_misses: AtomicU64,
    /// First fragments dropped because no next hop could be resolved.
    pub route_failures: AtomicU64,
    /// Live entries after the last table change.
    pub entries: AtomicUsize,
}

impl VrbStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merged(&self) {
        self.merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_full(&self) {
        self.full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, count: usize) {
        self.evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_removed(&self) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup(&self, hit: bool) {
        if hit {
            self.lookup_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lookup_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_route_failure(&self) {
        self.route_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_entries(&self, entries: usize) {
        self.entries.store(entries, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.created.load(Ordering::Relaxed),
            merged: self.merged.load(Ordering::Relaxed),
            full: self.full.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            lookup_hits: self.lookup_hits.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
            route_failures: self.route_failures.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`VrbStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub created: u64,
    pub merged: u64,
    pub full: u64,
    pub evicted: u64,
    pub removed: u64,
    pub lookup_hits: u64,
    pub lookup_misses: u64,
    pub route_failures: u64,
    pub entries: usize,
}

/// Stats report served by the node.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub uptime_secs: u64,
    pub capacity: usize,
    pub vrb: StatsSnapshot,
}

impl StatsReport {
    pub fn new(started: Instant, capacity: usize, vrb: StatsSnapshot) -> Self {
        Self {
            uptime_secs: started.elapsed().as_secs(),
            capacity,
            vrb,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = VrbStats::new();
        stats.record_created();
        stats.record_created();
        stats.record_full();
        stats.record_evicted(3);
        stats.record_lookup(true);
        stats.record_lookup(false);
        stats.record_lookup(false);

        let snap = stats.snapshot();
        assert_eq!(snap.created, 2);
        assert_eq!(snap.full, 1);
        assert_eq!(snap.evicted, 3);
        assert_eq!(snap.lookup_hits, 1);
        assert_eq!(snap.lookup_misses, 2);
        assert_eq!(snap.merged, 0);
    }

    #[test]
    fn test_report_json() {
        let stats = VrbStats::new();
        stats.record_route_failure();
        stats.set_entries(4);
        let report = StatsReport::new(Instant::now(), 16, stats.snapshot());
        let json = report.to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["capacity"], 16);
        assert_eq!(value["vrb"]["route_failures"], 1);
        assert_eq!(value["vrb"]["entries"], 4);
        assert_eq!(value["uptime_secs"], 0);
    }
}
