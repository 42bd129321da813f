//! Idle eviction and minimum-idle maintenance.
//!
//! A sweep visits every endpoint pool. For each it inspects up to
//! `numTestsPerEvictionRun` idle connections, oldest first: connections idle
//! longer than `minEvictableIdleTimeMillis` are destroyed, the rest are
//! probed when `testOnIdle` is set. Afterwards the endpoint is topped up to
//! `minIdle`. Sweeps run on the [`EvictionScheduler`] every
//! `evictionIntervalMillis`, or on demand through
//! [`PoolManager::run_eviction`](super::PoolManager::run_eviction).

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::endpoint::IdlePosition;
use super::manager::{Pool, PoolInner, Reservation};
use crate::factory::ConnectionFactory;

/// Outcome of one eviction sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    /// Endpoint pools visited
    pub endpoints: usize,
    /// Idle connections inspected
    pub inspected: usize,
    /// Connections destroyed for exceeding the idle age
    pub evicted_idle: usize,
    /// Connections destroyed for failing the idle probe
    pub evicted_invalid: usize,
    /// Connections created to restore `minIdle`
    pub created: usize,
    /// Failed top-up attempts
    pub create_failures: usize,
    /// Endpoints whose sweep panicked
    pub failed_endpoints: usize,
}

impl EvictionReport {
    /// Connections destroyed for any reason.
    pub fn evicted(&self) -> usize {
        self.evicted_idle + self.evicted_invalid
    }

    fn absorb(&mut self, other: EvictionReport) {
        self.inspected += other.inspected;
        self.evicted_idle += other.evicted_idle;
        self.evicted_invalid += other.evicted_invalid;
        self.created += other.created;
        self.create_failures += other.create_failures;
    }
}

impl<F: ConnectionFactory> PoolInner<F> {
    /// Sweep every endpoint once. A panic while sweeping one endpoint is
    /// logged and does not stop the others.
    pub(crate) async fn run_eviction(&self) -> EvictionReport {
        let mut report = EvictionReport::default();
        for pool in self.snapshot() {
            if self.is_closed() {
                break;
            }
            report.endpoints += 1;
            match AssertUnwindSafe(self.sweep_endpoint(&pool))
                .catch_unwind()
                .await
            {
                Ok(sweep) => report.absorb(sweep),
                Err(_) => {
                    report.failed_endpoints += 1;
                    error!(endpoint = %pool.endpoint(), "Eviction sweep panicked");
                }
            }
        }
        report
    }

    async fn sweep_endpoint(&self, pool: &Pool<F>) -> EvictionReport {
        let mut report = EvictionReport::default();
        let now = Instant::now();
        let max_idle_age = self.config.min_evictable_idle_time();

        let (expired, to_probe) = {
            let mut state = pool.lock();
            if state.removed {
                return report;
            }
            let budget = self.config.tests_per_eviction_run().min(state.idle.len());
            let mut expired = Vec::new();
            let mut to_probe = Vec::new();
            let mut kept = Vec::new();

            for _ in 0..budget {
                let Some(entry) = state.idle.pop_front() else {
                    break;
                };
                if max_idle_age.is_some_and(|age| entry.idle_for(now) > age) {
                    expired.push(entry);
                } else if self.config.test_on_idle() {
                    // Counted as active while the probe runs.
                    state.active += 1;
                    to_probe.push(entry);
                } else {
                    kept.push(entry);
                }
            }

            for entry in kept.into_iter().rev() {
                state.put_idle(entry, IdlePosition::Oldest);
            }
            for _ in &expired {
                self.free_slot(&mut state);
            }
            report.inspected = budget;
            (expired, to_probe)
        };

        report.evicted_idle = expired.len();
        for entry in expired {
            debug!(
                endpoint = %pool.endpoint(),
                id = entry.id,
                idle_for = ?entry.idle_for(now),
                "Evicting idle connection"
            );
            self.destroy(pool.endpoint(), entry.connection).await;
        }

        let mut probes: Vec<_> = to_probe
            .into_iter()
            .map(|entry| (entry, Reservation::new(self, pool)))
            .collect();
        // Newest first, so that re-queuing at the front keeps the order.
        while let Some((entry, reservation)) = probes.pop() {
            let alive = self.validate(pool, &entry).await;
            reservation.disarm();
            if alive {
                if let Some(rejected) = self.readmit(pool, entry, IdlePosition::Oldest) {
                    self.destroy(pool.endpoint(), rejected.connection).await;
                }
            } else {
                debug!(endpoint = %pool.endpoint(), id = entry.id, "Idle connection failed validation");
                report.evicted_invalid += 1;
                self.discard(pool, entry).await;
            }
        }

        self.ensure_min_idle(pool, &mut report).await;
        report
    }

    /// Create idle connections until the endpoint holds `minIdle` of them or a
    /// limit is reached. Stops at the first failure.
    async fn ensure_min_idle(&self, pool: &Pool<F>, report: &mut EvictionReport) {
        let floor = self.config.effective_min_idle();
        for _ in 0..floor {
            if !self.reserve_idle_slot(pool, Some(floor)) {
                break;
            }
            match self.add_idle(pool).await {
                Ok(()) => report.created += 1,
                Err(e) => {
                    report.create_failures += 1;
                    warn!(endpoint = %pool.endpoint(), error = %e, "Failed to restore minimum idle connections");
                    break;
                }
            }
        }
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Background task running eviction sweeps at a fixed period.
///
/// Holds the pool weakly: once the last [`PoolManager`](super::PoolManager)
/// handle and borrowed connection are gone the task ends on its own.
pub(crate) struct EvictionScheduler {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl EvictionScheduler {
    pub(crate) fn spawn<F: ConnectionFactory>(inner: &Arc<PoolInner<F>>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let pool: Weak<PoolInner<F>> = Arc::downgrade(inner);
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(period = ?period, "Eviction scheduler started");

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(inner) = pool.upgrade() else {
                    break;
                };
                if inner.is_closed() {
                    break;
                }
                let report = inner.run_eviction().await;
                trace!(
                    endpoints = report.endpoints,
                    evicted = report.evicted(),
                    created = report.created,
                    "Eviction sweep finished"
                );
            }

            debug!("Eviction scheduler stopped");
        });

        Self { token, handle }
    }

    /// Stop after the sweep in progress, if any.
    pub(crate) fn stop(&self) {
        self.token.cancel();
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for EvictionScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
