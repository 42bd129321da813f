//! The keyed pool manager.
//!
//! [`PoolManager`] maps endpoints to their [`EndpointPool`]s, enforces the
//! global `maxTotal` cap and routes borrow, return and invalidate calls.
//!
//! # Capacity accounting
//!
//! A unit of capacity is one connection counted both on its endpoint
//! (`idle + active`) and against the global total. Capacity is reserved
//! before the factory is called, so a slow `create` never lets the limits be
//! exceeded. Freed capacity goes, in order, to the endpoint's longest waiter,
//! then to the longest waiter on the global cap, and is only then released.
//!
//! A borrower blocked by the global cap alone holds a reservation on its own
//! endpoint while queued, so that the global slot it eventually receives can
//! be used immediately.
//!
//! Locks are always taken endpoint first, global second.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::endpoint::{
    hand_over, EndpointPool, EndpointState, Grant, IdlePosition, PoolEntry, Waiter,
};
use super::eviction::{EvictionReport, EvictionScheduler};
use super::handle::PooledConnection;
use super::stats::{EndpointStats, PoolCounters, PoolStats};
use crate::config::{ExhaustedAction, PoolConfig};
use crate::error::{ConnectError, PoolError, Result};
use crate::factory::ConnectionFactory;

/// Consecutive failed validations after which a borrow gives up.
const MAX_BORROW_VALIDATIONS: u32 = 3;

pub(crate) type Conn<F> = <F as ConnectionFactory>::Connection;
pub(crate) type Pool<F> = EndpointPool<<F as ConnectionFactory>::Endpoint, Conn<F>>;
pub(crate) type Entry<F> = PoolEntry<Conn<F>>;

/// Result of a pre-warming operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrewarmResult {
    /// Number of connections successfully created
    pub success: usize,
    /// Number of connections that failed to create
    pub failures: usize,
}

struct GlobalWaiter<F: ConnectionFactory> {
    id: u64,
    pool: Arc<Pool<F>>,
    tx: oneshot::Sender<Grant<Conn<F>>>,
}

struct GlobalState<F: ConnectionFactory> {
    total: usize,
    waiters: VecDeque<GlobalWaiter<F>>,
}

impl<F: ConnectionFactory> GlobalState<F> {
    fn can_reserve(&self, limit: Option<usize>) -> bool {
        self.waiters.is_empty() && limit.map_or(true, |max| self.total < max)
    }
}

enum Acquire<C> {
    Idle(PoolEntry<C>),
    Create,
    Wait(u64, oneshot::Receiver<Grant<C>>),
    GloballyExhausted,
    Exhausted,
    Stale,
    Closed,
}

enum Obtained<C> {
    Existing(PoolEntry<C>),
    Create,
}

/// State shared by the manager, its handles and the eviction task.
pub(crate) struct PoolInner<F: ConnectionFactory> {
    pub(crate) config: PoolConfig,
    pub(crate) factory: Arc<F>,
    endpoints: DashMap<F::Endpoint, Arc<Pool<F>>>,
    global: Mutex<GlobalState<F>>,
    pub(crate) counters: PoolCounters,
    next_connection_id: AtomicU64,
    next_waiter_id: AtomicU64,
    closed: AtomicBool,
}

/// Capacity held on an endpoint while the holder awaits the factory.
///
/// Dropping an armed reservation frees the capacity, so a borrow whose
/// future is dropped mid-creation does not leak it.
pub(crate) struct Reservation<'a, F: ConnectionFactory> {
    inner: &'a PoolInner<F>,
    pool: &'a Pool<F>,
    armed: bool,
}

impl<'a, F: ConnectionFactory> Reservation<'a, F> {
    pub(crate) fn new(inner: &'a PoolInner<F>, pool: &'a Pool<F>) -> Self {
        Self {
            inner,
            pool,
            armed: true,
        }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl<F: ConnectionFactory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.detach(self.pool);
        }
    }
}

/// A borrower queued for capacity. Dropping it while armed withdraws it and
/// gives back anything it was granted in the meantime.
struct QueuedBorrow<'a, F: ConnectionFactory> {
    inner: &'a PoolInner<F>,
    pool: &'a Arc<Pool<F>>,
    id: u64,
    rx: oneshot::Receiver<Grant<Conn<F>>>,
    armed: bool,
}

impl<F: ConnectionFactory> Drop for QueuedBorrow<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(grant) = self.inner.withdraw(self.pool, self.id, &mut self.rx) {
                self.inner.restore(self.pool, grant);
            }
        }
    }
}

impl<F: ConnectionFactory> PoolInner<F> {
    fn new(factory: F, config: PoolConfig) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
            endpoints: DashMap::new(),
            global: Mutex::new(GlobalState {
                total: 0,
                waiters: VecDeque::new(),
            }),
            counters: PoolCounters::default(),
            next_connection_id: AtomicU64::new(0),
            next_waiter_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn endpoint_pool(&self, endpoint: &F::Endpoint) -> Arc<Pool<F>> {
        if let Some(pool) = self.endpoints.get(endpoint) {
            return Arc::clone(pool.value());
        }
        let pool = self.endpoints.entry(endpoint.clone()).or_insert_with(|| {
            debug!(endpoint = %endpoint, "Creating endpoint pool");
            Arc::new(EndpointPool::new(endpoint.clone()))
        });
        Arc::clone(pool.value())
    }

    /// The current endpoint pools, without holding any map lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Pool<F>>> {
        self.endpoints.iter().map(|e| Arc::clone(e.value())).collect()
    }

    // ========================================================================
    // Capacity bookkeeping
    // ========================================================================

    fn has_global_waiters(&self) -> bool {
        !self.global.lock().waiters.is_empty()
    }

    /// Give one unit of global capacity to the longest global waiter, or
    /// drop it from the total.
    fn release_global(&self) {
        let mut global = self.global.lock();
        while let Some(waiter) = global.waiters.pop_front() {
            if waiter.tx.send(Grant::Slot).is_ok() {
                trace!(endpoint = %waiter.pool.endpoint(), id = waiter.id, "Handed global capacity to waiter");
                return;
            }
        }
        global.total = global.total.saturating_sub(1);
    }

    /// Free one unit of capacity whose endpoint count the caller has already
    /// decremented.
    pub(crate) fn free_slot(&self, state: &mut EndpointState<Conn<F>>) {
        if !state.removed && state.grant_slot() {
            state.active += 1;
            return;
        }
        self.release_global();
    }

    /// Free the capacity of a checked-out connection that is going away.
    pub(crate) fn detach(&self, pool: &Pool<F>) {
        let mut state = pool.lock();
        state.active = state.active.saturating_sub(1);
        self.free_slot(&mut state);
    }

    /// Drop the endpoint reservation of a withdrawn global waiter.
    fn release_reservation(&self, pool: &Arc<Pool<F>>) {
        let mut state = pool.lock();
        state.active = state.active.saturating_sub(1);
        if state.removed {
            return;
        }
        // The freed endpoint capacity lets the next local waiter move on to
        // the global cap.
        let mut global = self.global.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            if global.can_reserve(self.config.max_total_limit()) {
                if waiter.tx.send(Grant::Slot).is_ok() {
                    global.total += 1;
                    state.active += 1;
                    return;
                }
            } else if !waiter.tx.is_closed() {
                state.active += 1;
                global.waiters.push_back(GlobalWaiter {
                    id: waiter.id,
                    pool: Arc::clone(pool),
                    tx: waiter.tx,
                });
                return;
            }
        }
    }

    /// Reserve capacity for a connection that will be parked idle.
    ///
    /// Refuses once the idle set reaches `target_idle` or `maxIdle`, when the
    /// endpoint or global cap is reached, or while anyone is waiting.
    pub(crate) fn reserve_idle_slot(&self, pool: &Pool<F>, target_idle: Option<usize>) -> bool {
        let mut state = pool.lock();
        if state.removed || self.is_closed() || !state.waiters.is_empty() {
            return false;
        }
        let idle = state.idle.len();
        if target_idle.is_some_and(|target| idle >= target)
            || self.config.max_idle_limit().is_some_and(|max| idle >= max)
            || !state.has_room(self.config.max_active_limit())
        {
            return false;
        }
        let mut global = self.global.lock();
        if !global.can_reserve(self.config.max_total_limit()) {
            return false;
        }
        global.total += 1;
        state.active += 1;
        true
    }

    // ========================================================================
    // Borrow
    // ========================================================================

    pub(crate) async fn borrow(
        self: &Arc<Self>,
        endpoint: &F::Endpoint,
        cancel: Option<&CancellationToken>,
    ) -> Result<PooledConnection<F>> {
        let deadline = self.config.max_wait().map(|wait| Instant::now() + wait);
        let mut may_reclaim = true;
        let mut failed_validations = 0u32;

        loop {
            if self.is_closed() {
                return Err(PoolError::Closed);
            }
            let pool = self.endpoint_pool(endpoint);

            let obtained = match self.try_acquire(&pool, may_reclaim) {
                Acquire::Idle(entry) => Obtained::Existing(entry),
                Acquire::Create => Obtained::Create,
                Acquire::Wait(id, rx) => {
                    match self.wait_for_grant(&pool, id, rx, deadline, cancel).await? {
                        Grant::Connection(entry) => Obtained::Existing(entry),
                        Grant::Slot => Obtained::Create,
                        Grant::Removed => {
                            return Err(PoolError::EndpointRemoved(endpoint.to_string()))
                        }
                        Grant::Closed => return Err(PoolError::Closed),
                    }
                }
                Acquire::GloballyExhausted => {
                    may_reclaim = false;
                    self.reclaim_idle(&pool).await;
                    continue;
                }
                Acquire::Exhausted => {
                    return Err(PoolError::EndpointExhausted(endpoint.to_string()))
                }
                Acquire::Stale => continue,
                Acquire::Closed => return Err(PoolError::Closed),
            };

            let reservation = Reservation::new(self, &pool);
            if self.is_closed() {
                if let Obtained::Existing(entry) = obtained {
                    reservation.disarm();
                    self.discard(&pool, entry).await;
                }
                return Err(PoolError::Closed);
            }
            let mut entry = match obtained {
                Obtained::Existing(entry) => {
                    PoolCounters::incr(&self.counters.hits);
                    entry
                }
                Obtained::Create => {
                    let entry = self.create_entry(&pool).await.map_err(|source| {
                        PoolError::ConnectFailed {
                            endpoint: endpoint.to_string(),
                            source,
                        }
                    })?;
                    PoolCounters::incr(&self.counters.misses);
                    entry
                }
            };

            if self.config.test_on_borrow() && !self.validate(&pool, &entry).await {
                reservation.disarm();
                debug!(endpoint = %endpoint, id = entry.id, "Connection failed validation on borrow");
                self.discard(&pool, entry).await;
                failed_validations += 1;
                if failed_validations >= MAX_BORROW_VALIDATIONS {
                    return Err(PoolError::ConnectFailed {
                        endpoint: endpoint.to_string(),
                        source: ConnectError::ValidationFailed {
                            attempts: failed_validations,
                        },
                    });
                }
                continue;
            }

            reservation.disarm();
            entry.borrow_count += 1;
            trace!(endpoint = %endpoint, id = entry.id, "Borrowed connection");
            return Ok(PooledConnection::new(entry, pool, Arc::clone(self)));
        }
    }

    fn try_acquire(&self, pool: &Arc<Pool<F>>, may_reclaim: bool) -> Acquire<Conn<F>> {
        let mut state = pool.lock();
        if self.is_closed() {
            return Acquire::Closed;
        }
        if state.removed {
            return Acquire::Stale;
        }

        if let Some(entry) = state.take_idle(self.config.lifo()) {
            state.active += 1;
            return Acquire::Idle(entry);
        }

        let wait = self.config.exhausted_action() == ExhaustedAction::Wait;

        if !state.has_room(self.config.max_active_limit()) {
            if !wait {
                return Acquire::Exhausted;
            }
            let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(Waiter { id, tx });
            return Acquire::Wait(id, rx);
        }

        let mut global = self.global.lock();
        if global.can_reserve(self.config.max_total_limit()) {
            global.total += 1;
            state.active += 1;
            return Acquire::Create;
        }
        if may_reclaim {
            return Acquire::GloballyExhausted;
        }
        if !wait {
            return Acquire::Exhausted;
        }

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        state.active += 1;
        global.waiters.push_back(GlobalWaiter {
            id,
            pool: Arc::clone(pool),
            tx,
        });
        Acquire::Wait(id, rx)
    }

    async fn wait_for_grant(
        &self,
        pool: &Arc<Pool<F>>,
        id: u64,
        rx: oneshot::Receiver<Grant<Conn<F>>>,
        deadline: Option<Instant>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Grant<Conn<F>>> {
        let mut queued = QueuedBorrow {
            inner: self,
            pool,
            id,
            rx,
            armed: true,
        };
        trace!(endpoint = %pool.endpoint(), waiter = id, "Waiting for a connection");

        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => future::pending::<()>().await,
            }
        };

        let interrupted = tokio::select! {
            grant = &mut queued.rx => {
                queued.armed = false;
                return grant.map_err(|_| PoolError::Closed);
            }
            () = expired => PoolError::BorrowTimeout {
                endpoint: pool.endpoint().to_string(),
                waited: self.config.max_wait().unwrap_or_default(),
            },
            () = cancelled => PoolError::Cancelled(pool.endpoint().to_string()),
        };

        // A grant that raced the deadline wins; otherwise the waiter is gone
        // from every queue by the time we report the failure.
        queued.armed = false;
        match self.withdraw(pool, id, &mut queued.rx) {
            Some(grant) => Ok(grant),
            None => {
                if matches!(interrupted, PoolError::BorrowTimeout { .. }) {
                    PoolCounters::incr(&self.counters.timeouts);
                }
                debug!(endpoint = %pool.endpoint(), waiter = id, error = %interrupted, "Borrow gave up waiting");
                Err(interrupted)
            }
        }
    }

    /// Remove a waiter from whichever queue holds it. Returns its grant if it
    /// was already served.
    fn withdraw(
        &self,
        pool: &Arc<Pool<F>>,
        id: u64,
        rx: &mut oneshot::Receiver<Grant<Conn<F>>>,
    ) -> Option<Grant<Conn<F>>> {
        let queued_globally = {
            let mut state = pool.lock();
            if state.withdraw(id) {
                return None;
            }
            let mut global = self.global.lock();
            match global.waiters.iter().position(|w| w.id == id) {
                Some(pos) => {
                    global.waiters.remove(pos);
                    true
                }
                None => false,
            }
        };

        if queued_globally {
            self.release_reservation(pool);
            return None;
        }
        // Grants are sent under the lock that dequeues the waiter, so an
        // unqueued waiter always finds its grant in the channel.
        rx.try_recv().ok()
    }

    /// Give back a grant whose borrower went away.
    fn restore(&self, pool: &Pool<F>, grant: Grant<Conn<F>>) {
        match grant {
            Grant::Connection(entry) => {
                if let Some(rejected) = self.readmit(pool, entry, IdlePosition::Newest) {
                    self.destroy_later(pool.endpoint().clone(), rejected.connection);
                }
            }
            Grant::Slot => self.detach(pool),
            Grant::Removed | Grant::Closed => {}
        }
    }

    /// Destroy the longest-idle connection of another endpoint so that its
    /// global capacity can be reused.
    async fn reclaim_idle(&self, requester: &Arc<Pool<F>>) -> bool {
        let oldest = self
            .snapshot()
            .into_iter()
            .filter(|pool| !Arc::ptr_eq(pool, requester))
            .filter_map(|pool| {
                let since = pool.lock().idle.front().map(|e| e.idle_since)?;
                Some((since, pool))
            })
            .min_by_key(|(since, _)| *since);
        let Some((_, victim)) = oldest else {
            return false;
        };

        let entry = {
            let mut state = victim.lock();
            let Some(entry) = state.idle.pop_front() else {
                return false;
            };
            self.free_slot(&mut state);
            entry
        };

        debug!(
            endpoint = %victim.endpoint(),
            id = entry.id,
            requester = %requester.endpoint(),
            "Reclaiming idle connection for the global limit"
        );
        self.destroy(victim.endpoint(), entry.connection).await;
        true
    }

    async fn create_entry(&self, pool: &Pool<F>) -> std::result::Result<Entry<F>, ConnectError> {
        match self.factory.create(pool.endpoint()).await {
            Ok(connection) => {
                PoolCounters::incr(&self.counters.created);
                let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(endpoint = %pool.endpoint(), id, "Created connection");
                Ok(PoolEntry::new(id, connection))
            }
            Err(e) => {
                PoolCounters::incr(&self.counters.create_failures);
                debug!(endpoint = %pool.endpoint(), error = %e, "Connection factory failed");
                Err(e)
            }
        }
    }

    pub(crate) async fn validate(&self, pool: &Pool<F>, entry: &Entry<F>) -> bool {
        let valid = self.factory.validate(pool.endpoint(), &entry.connection).await;
        if !valid {
            PoolCounters::incr(&self.counters.validation_failures);
        }
        valid
    }

    // ========================================================================
    // Return
    // ========================================================================

    pub(crate) async fn release(&self, pool: &Pool<F>, mut entry: Entry<F>) {
        PoolCounters::incr(&self.counters.returned);
        let reservation = Reservation::new(self, pool);

        if self.config.test_on_return() && !self.validate(pool, &entry).await {
            reservation.disarm();
            debug!(endpoint = %pool.endpoint(), id = entry.id, "Returned connection failed validation");
            self.discard(pool, entry).await;
            return;
        }

        reservation.disarm();
        entry.idle_since = Instant::now();
        if let Some(rejected) = self.readmit(pool, entry, IdlePosition::Newest) {
            trace!(endpoint = %pool.endpoint(), id = rejected.id, "Destroying surplus connection");
            self.destroy(pool.endpoint(), rejected.connection).await;
        }
    }

    /// Put a connection counted as active back into circulation: to the
    /// longest waiter if there is one, otherwise into the idle set.
    ///
    /// Borrowers of this endpoint held back by `maxTotal` come first, then
    /// those queued on the endpoint itself.
    ///
    /// Returns the entry when it must be destroyed instead: the endpoint is
    /// gone, `maxIdle` is reached, or borrowers on other endpoints are
    /// waiting for global capacity.
    pub(crate) fn readmit(
        &self,
        pool: &Pool<F>,
        entry: Entry<F>,
        position: IdlePosition,
    ) -> Option<Entry<F>> {
        let mut state = pool.lock();
        if state.removed || self.is_closed() {
            state.active = state.active.saturating_sub(1);
            self.free_slot(&mut state);
            return Some(entry);
        }

        let Some(entry) = self.offer_global(pool, &mut state, entry) else {
            // The waiter's reservation now counts the connection.
            state.active = state.active.saturating_sub(1);
            return None;
        };
        let entry = state.offer(entry)?;
        state.active = state.active.saturating_sub(1);

        let idle_full = self
            .config
            .max_idle_limit()
            .is_some_and(|max| state.idle.len() >= max);
        if idle_full || self.has_global_waiters() {
            self.free_slot(&mut state);
            return Some(entry);
        }

        state.put_idle(entry, position);
        None
    }

    /// Hand `entry` to the longest waiter of `pool` queued on the global cap.
    /// The waiter already holds an endpoint reservation and the connection
    /// keeps its global unit.
    fn offer_global(
        &self,
        pool: &Pool<F>,
        state: &mut EndpointState<Conn<F>>,
        mut entry: Entry<F>,
    ) -> Option<Entry<F>> {
        let mut global = self.global.lock();
        while let Some(pos) = global
            .waiters
            .iter()
            .position(|w| std::ptr::eq(Arc::as_ptr(&w.pool), pool))
        {
            let Some(waiter) = global.waiters.remove(pos) else {
                break;
            };
            let id = waiter.id;
            match hand_over(waiter.tx, entry) {
                None => {
                    trace!(endpoint = %pool.endpoint(), waiter = id, "Handed connection to global waiter");
                    return None;
                }
                Some(back) => {
                    // The borrower is gone; so is its reservation.
                    state.active = state.active.saturating_sub(1);
                    entry = back;
                }
            }
        }
        Some(entry)
    }

    pub(crate) async fn discard(&self, pool: &Pool<F>, entry: Entry<F>) {
        self.detach(pool);
        self.destroy(pool.endpoint(), entry.connection).await;
    }

    pub(crate) async fn destroy(&self, endpoint: &F::Endpoint, connection: Conn<F>) {
        PoolCounters::incr(&self.counters.destroyed);
        self.factory.destroy(endpoint, connection).await;
    }

    /// Destroy from a synchronous context, on the current runtime if any.
    pub(crate) fn destroy_later(&self, endpoint: F::Endpoint, connection: Conn<F>) {
        PoolCounters::incr(&self.counters.destroyed);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let factory = Arc::clone(&self.factory);
                handle.spawn(async move {
                    factory.destroy(&endpoint, connection).await;
                });
            }
            Err(_) => drop(connection),
        }
    }

    // ========================================================================
    // Administration
    // ========================================================================

    /// Create a connection into capacity reserved with
    /// [`reserve_idle_slot`](Self::reserve_idle_slot) and park it.
    pub(crate) async fn add_idle(&self, pool: &Pool<F>) -> std::result::Result<(), ConnectError> {
        let reservation = Reservation::new(self, pool);
        let entry = self.create_entry(pool).await?;
        reservation.disarm();
        if let Some(rejected) = self.readmit(pool, entry, IdlePosition::Newest) {
            self.destroy(pool.endpoint(), rejected.connection).await;
        }
        Ok(())
    }

    async fn prewarm(&self, endpoint: &F::Endpoint, count: usize) -> PrewarmResult {
        if self.is_closed() {
            return PrewarmResult {
                success: 0,
                failures: count,
            };
        }

        let pool = self.endpoint_pool(endpoint);
        let mut result = PrewarmResult::default();
        for _ in 0..count {
            if !self.reserve_idle_slot(&pool, None) {
                debug!(endpoint = %endpoint, "Endpoint at capacity, skipping remaining pre-warm");
                break;
            }
            match self.add_idle(&pool).await {
                Ok(()) => result.success += 1,
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Pre-warm connection failed");
                    result.failures += 1;
                }
            }
        }

        info!(endpoint = %endpoint, success = result.success, failures = result.failures, "Pre-warming complete");
        result
    }

    /// Detach `pool` from service: fail its waiters with `failure`, release
    /// the capacity of its idle connections and return them for destruction.
    fn retire(&self, pool: &Arc<Pool<F>>, failure: fn() -> Grant<Conn<F>>) -> Vec<Entry<F>> {
        let mut state = pool.lock();
        let drained = state.retire(failure);
        {
            let mut global = self.global.lock();
            let waiters = std::mem::take(&mut global.waiters);
            for waiter in waiters {
                if Arc::ptr_eq(&waiter.pool, pool) {
                    state.active = state.active.saturating_sub(1);
                    let _ = waiter.tx.send(failure());
                } else {
                    global.waiters.push_back(waiter);
                }
            }
        }
        for _ in &drained {
            self.release_global();
        }
        drained
    }

    async fn remove_endpoint(&self, endpoint: &F::Endpoint) -> bool {
        let Some((_, pool)) = self.endpoints.remove(endpoint) else {
            return false;
        };
        let drained = self.retire(&pool, || Grant::Removed);
        info!(endpoint = %endpoint, idle = drained.len(), "Removed endpoint from pool");
        for entry in drained {
            self.destroy(pool.endpoint(), entry.connection).await;
        }
        true
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing connection pool");

        let keys: Vec<F::Endpoint> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        let mut drained = Vec::new();
        for key in keys {
            if let Some((_, pool)) = self.endpoints.remove(&key) {
                let entries = self.retire(&pool, || Grant::Closed);
                drained.push((pool, entries));
            }
        }

        for (pool, entries) in drained {
            for entry in entries {
                self.destroy(pool.endpoint(), entry.connection).await;
            }
        }
    }

    fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for pool in self.snapshot() {
            let endpoint = pool.stats();
            stats.endpoints += 1;
            stats.idle_connections += endpoint.idle;
            stats.active_connections += endpoint.active;
            stats.waiting += endpoint.waiters;
        }
        {
            let global = self.global.lock();
            stats.total_connections = global.total;
            stats.waiting += global.waiters.len();
        }
        self.counters.fill(&mut stats);
        stats
    }
}

// ============================================================================
// Public manager
// ============================================================================

/// Keyed connection pool.
///
/// # Example
///
/// ```rust,ignore
/// use corral::prelude::*;
///
/// let config = PoolConfig::builder().max_active(8).build()?;
/// let pool = PoolManager::new(TcpConnectionFactory::new(), config);
///
/// let endpoint: ServerAddress = "cache1:11222".parse()?;
/// let conn = pool.borrow(&endpoint).await?;
/// // ... use the connection ...
/// pool.release(conn).await;
/// ```
pub struct PoolManager<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
    scheduler: Option<EvictionScheduler>,
}

impl<F: ConnectionFactory> PoolManager<F> {
    /// Create a pool with the default configuration.
    pub fn with_defaults(factory: F) -> Self {
        Self::new(factory, PoolConfig::default())
    }

    /// Create a pool.
    ///
    /// When `evictionInterval` is positive and a tokio runtime is available
    /// the eviction scheduler is started right away.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        debug!(
            max_active = config.max_active(),
            max_total = config.max_total(),
            max_idle = config.max_idle(),
            min_idle = config.min_idle(),
            exhausted_action = %config.exhausted_action(),
            "Creating connection pool"
        );
        let inner = Arc::new(PoolInner::new(factory, config));
        let scheduler = inner.config.eviction_interval().and_then(|period| {
            if tokio::runtime::Handle::try_current().is_ok() {
                Some(EvictionScheduler::spawn(&inner, period))
            } else {
                warn!("No tokio runtime available; eviction scheduler not started");
                None
            }
        });
        Self { inner, scheduler }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Borrow a connection to `endpoint`.
    pub async fn borrow(&self, endpoint: &F::Endpoint) -> Result<PooledConnection<F>> {
        self.inner.borrow(endpoint, None).await
    }

    /// Borrow a connection, giving up with [`PoolError::Cancelled`] once
    /// `cancel` fires while waiting.
    pub async fn borrow_cancellable(
        &self,
        endpoint: &F::Endpoint,
        cancel: &CancellationToken,
    ) -> Result<PooledConnection<F>> {
        self.inner.borrow(endpoint, Some(cancel)).await
    }

    /// Return a connection to its endpoint pool.
    pub async fn release(&self, connection: PooledConnection<F>) {
        connection.release().await;
    }

    /// Destroy a connection known to be broken.
    pub async fn invalidate(&self, connection: PooledConnection<F>) {
        connection.invalidate().await;
    }

    /// Drop an endpoint: destroy its idle connections and fail its waiters
    /// with [`PoolError::EndpointRemoved`]. Returns false for unknown
    /// endpoints.
    pub async fn remove_endpoint(&self, endpoint: &F::Endpoint) -> bool {
        self.inner.remove_endpoint(endpoint).await
    }

    /// Create up to `count` idle connections for `endpoint` within the limits.
    pub async fn prewarm(&self, endpoint: &F::Endpoint, count: usize) -> PrewarmResult {
        self.inner.prewarm(endpoint, count).await
    }

    /// Run one eviction sweep now.
    pub async fn run_eviction(&self) -> EvictionReport {
        self.inner.run_eviction().await
    }

    /// Endpoints that currently have a pool.
    pub fn endpoints(&self) -> Vec<F::Endpoint> {
        self.inner
            .endpoints
            .iter()
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn endpoint_stats(&self, endpoint: &F::Endpoint) -> Option<EndpointStats> {
        let pool = self.inner.endpoints.get(endpoint).map(|e| Arc::clone(e.value()))?;
        Some(pool.stats())
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    pub fn is_eviction_running(&self) -> bool {
        self.scheduler.as_ref().is_some_and(EvictionScheduler::is_running)
    }

    /// Stop the scheduler, fail all waiters and destroy idle connections.
    /// Connections returned afterwards are destroyed.
    pub async fn close(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.stop();
        }
        self.inner.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<F: ConnectionFactory> fmt::Debug for PoolManager<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("config", &self.inner.config)
            .field("endpoints", &self.inner.endpoints.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
