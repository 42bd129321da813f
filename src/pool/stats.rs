//! Pool statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Snapshot of one endpoint's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    /// Connections held idle by the pool
    pub idle: usize,
    /// Connections checked out, or reserved for a connection being created
    pub active: usize,
    /// Borrowers queued on this endpoint
    pub waiters: usize,
}

impl EndpointStats {
    /// Idle plus active connections.
    pub fn total(&self) -> usize {
        self.idle + self.active
    }
}

/// Snapshot of the whole pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Number of endpoint pools
    pub endpoints: usize,
    /// Connections counted against `maxTotal`
    pub total_connections: usize,
    /// Idle connections across all endpoints
    pub idle_connections: usize,
    /// Checked-out connections across all endpoints
    pub active_connections: usize,
    /// Borrowers currently waiting, per endpoint and on the global cap
    pub waiting: usize,
    /// Borrows served from the idle set
    pub hits: u64,
    /// Borrows served by creating a connection
    pub misses: u64,
    /// Connections created by the factory
    pub created: u64,
    /// Connections destroyed
    pub destroyed: u64,
    /// Failed creation attempts
    pub create_failures: u64,
    /// Connections returned to the pool
    pub returned: u64,
    /// Failed validations on borrow, return or while idle
    pub validation_failures: u64,
    /// Borrows that gave up waiting
    pub timeouts: u64,
}

/// Monotonic counters shared by all pool operations.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) hits: AtomicU64,
    pub(crate) misses: AtomicU64,
    pub(crate) created: AtomicU64,
    pub(crate) destroyed: AtomicU64,
    pub(crate) create_failures: AtomicU64,
    pub(crate) returned: AtomicU64,
    pub(crate) validation_failures: AtomicU64,
    pub(crate) timeouts: AtomicU64,
}

impl PoolCounters {
    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Fill the counter fields of `stats`.
    pub(crate) fn fill(&self, stats: &mut PoolStats) {
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.created = self.created.load(Ordering::Relaxed);
        stats.destroyed = self.destroyed.load(Ordering::Relaxed);
        stats.create_failures = self.create_failures.load(Ordering::Relaxed);
        stats.returned = self.returned.load(Ordering::Relaxed);
        stats.validation_failures = self.validation_failures.load(Ordering::Relaxed);
        stats.timeouts = self.timeouts.load(Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_stats_default() {
        let stats = PoolStats::default();
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.idle_connections, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_counters_fill() {
        let counters = PoolCounters::default();
        PoolCounters::incr(&counters.created);
        PoolCounters::incr(&counters.created);
        PoolCounters::incr(&counters.timeouts);

        let mut stats = PoolStats::default();
        counters.fill(&mut stats);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.destroyed, 0);
    }

    #[test]
    fn test_endpoint_stats_total() {
        let stats = EndpointStats {
            idle: 2,
            active: 3,
            waiters: 1,
        };
        assert_eq!(stats.total(), 5);
    }
}
