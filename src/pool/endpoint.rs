//! Per-endpoint pool state.
//!
//! An [`EndpointPool`] owns the idle connections, the active count and the
//! waiter queue of a single endpoint. All of it lives behind one mutex which
//! is held for bookkeeping only, never across a factory call.
//!
//! The idle queue is ordered by release time: the front holds the connection
//! that has been idle longest, the back the most recently released one.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::stats::EndpointStats;

/// A connection together with its pool metadata.
pub(crate) struct PoolEntry<C> {
    pub(crate) id: u64,
    pub(crate) connection: C,
    pub(crate) created_at: Instant,
    pub(crate) idle_since: Instant,
    pub(crate) borrow_count: u64,
}

impl<C> PoolEntry<C> {
    pub(crate) fn new(id: u64, connection: C) -> Self {
        let now = Instant::now();
        Self {
            id,
            connection,
            created_at: now,
            idle_since: now,
            borrow_count: 0,
        }
    }

    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.idle_since)
    }
}

/// What a queued borrower is woken with.
pub(crate) enum Grant<C> {
    /// A released connection; the capacity stays counted as active.
    Connection(PoolEntry<C>),
    /// Capacity for one new connection, already counted as active.
    Slot,
    /// The endpoint was removed.
    Removed,
    /// The pool was closed.
    Closed,
}

/// Send `entry` to a waiting borrower. Returns it if the borrower is gone.
pub(crate) fn hand_over<C>(
    tx: oneshot::Sender<Grant<C>>,
    entry: PoolEntry<C>,
) -> Option<PoolEntry<C>> {
    let Err(Grant::Connection(back)) = tx.send(Grant::Connection(entry)) else {
        return None;
    };
    Some(back)
}

/// A borrower queued under the WAIT policy.
pub(crate) struct Waiter<C> {
    pub(crate) id: u64,
    pub(crate) tx: oneshot::Sender<Grant<C>>,
}

/// Where a connection re-enters the idle queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdlePosition {
    /// Just released; the back of the queue.
    Newest,
    /// Keeps its original idle age; the front of the queue.
    Oldest,
}

/// Mutable state of one endpoint. Only touched under [`EndpointPool::lock`].
pub(crate) struct EndpointState<C> {
    pub(crate) idle: VecDeque<PoolEntry<C>>,
    pub(crate) active: usize,
    pub(crate) waiters: VecDeque<Waiter<C>>,
    pub(crate) removed: bool,
}

impl<C> EndpointState<C> {
    fn new() -> Self {
        Self {
            idle: VecDeque::new(),
            active: 0,
            waiters: VecDeque::new(),
            removed: false,
        }
    }

    /// Idle plus active connections.
    pub(crate) fn total(&self) -> usize {
        self.idle.len() + self.active
    }

    /// Whether one more connection fits under `limit`.
    pub(crate) fn has_room(&self, limit: Option<usize>) -> bool {
        limit.map_or(true, |max| self.total() < max)
    }

    /// Take an idle connection: the newest under LIFO, the oldest otherwise.
    pub(crate) fn take_idle(&mut self, lifo: bool) -> Option<PoolEntry<C>> {
        if lifo {
            self.idle.pop_back()
        } else {
            self.idle.pop_front()
        }
    }

    pub(crate) fn put_idle(&mut self, entry: PoolEntry<C>, position: IdlePosition) {
        match position {
            IdlePosition::Newest => self.idle.push_back(entry),
            IdlePosition::Oldest => self.idle.push_front(entry),
        }
    }

    /// Hand `entry` to the longest-waiting borrower.
    ///
    /// Returns the entry if nobody took it. Counts are left to the caller.
    pub(crate) fn offer(&mut self, mut entry: PoolEntry<C>) -> Option<PoolEntry<C>> {
        while let Some(waiter) = self.waiters.pop_front() {
            entry = hand_over(waiter.tx, entry)?;
        }
        Some(entry)
    }

    /// Hand one unit of capacity to the longest-waiting borrower.
    pub(crate) fn grant_slot(&mut self) -> bool {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.tx.send(Grant::Slot).is_ok() {
                return true;
            }
        }
        false
    }

    /// Drop a queued waiter. False if it is no longer queued.
    pub(crate) fn withdraw(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == id) {
            Some(pos) => {
                self.waiters.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Mark the endpoint as gone, fail every waiter and hand back the idle
    /// connections for destruction.
    pub(crate) fn retire(&mut self, failure: impl Fn() -> Grant<C>) -> Vec<PoolEntry<C>> {
        self.removed = true;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.tx.send(failure());
        }
        self.idle.drain(..).collect()
    }
}

/// The sub-pool of one endpoint.
pub(crate) struct EndpointPool<K, C> {
    endpoint: K,
    state: Mutex<EndpointState<C>>,
}

impl<K, C> EndpointPool<K, C> {
    pub(crate) fn new(endpoint: K) -> Self {
        Self {
            endpoint,
            state: Mutex::new(EndpointState::new()),
        }
    }

    pub(crate) fn endpoint(&self) -> &K {
        &self.endpoint
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EndpointState<C>> {
        self.state.lock()
    }

    pub(crate) fn stats(&self) -> EndpointStats {
        let state = self.state.lock();
        EndpointStats {
            idle: state.idle.len(),
            active: state.active,
            waiters: state.waiters.len(),
        }
    }
}
