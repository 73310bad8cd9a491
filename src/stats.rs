//! Statistics tracking for the relay.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic statistics for tracking relay activity.
pub struct Stats {
    pub requests: AtomicU64,
    pub forwarded: AtomicU64,
    pub malformed: AtomicU64,
    pub upstream_failed: AtomicU64,
    pub whitelisted: AtomicU64,
    /// Cumulative response time of forwarded exchanges in microseconds.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            upstream_failed: AtomicU64::new(0),
            whitelisted: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, response_time_ms: f64) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add((response_time_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_failed(&self) {
        self.upstream_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count addresses newly submitted for whitelisting.
    pub fn record_whitelisted(&self, addresses: usize) {
        self.whitelisted
            .fetch_add(addresses as u64, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let forwarded = self.forwarded.swap(0, Ordering::Relaxed);
        let malformed = self.malformed.swap(0, Ordering::Relaxed);
        let upstream_failed = self.upstream_failed.swap(0, Ordering::Relaxed);
        let whitelisted = self.whitelisted.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let avg_response_ms = if forwarded > 0 {
            (total_us as f64 / forwarded as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            requests,
            forwarded,
            malformed,
            upstream_failed,
            whitelisted,
            avg_response_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StatsSnapshot {
    pub requests: u64,
    pub forwarded: u64,
    pub malformed: u64,
    pub upstream_failed: u64,
    pub whitelisted: u64,
    pub avg_response_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_and_reset_averages_forwarded() {
        let stats = Stats::new();
        stats.record_request();
        stats.record_request();
        stats.record_request();
        stats.record_forwarded(2.0);
        stats.record_forwarded(4.0);
        stats.record_malformed();
        stats.record_whitelisted(3);

        let snapshot = stats.snapshot_and_reset();

        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.forwarded, 2);
        assert_eq!(snapshot.malformed, 1);
        assert_eq!(snapshot.upstream_failed, 0);
        assert_eq!(snapshot.whitelisted, 3);
        assert!((snapshot.avg_response_ms - 3.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_and_reset_clears_counters() {
        let stats = Stats::new();
        stats.record_request();
        stats.record_upstream_failed();
        stats.snapshot_and_reset();

        let snapshot = stats.snapshot_and_reset();

        assert_eq!(snapshot.requests, 0);
        assert_eq!(snapshot.upstream_failed, 0);
        assert_eq!(snapshot.avg_response_ms, 0.0);
    }
}
