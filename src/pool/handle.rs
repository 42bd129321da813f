//! Borrowed connection handle.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use super::manager::{Conn, Entry, Pool, PoolInner};
use crate::factory::ConnectionFactory;

/// A connection checked out of the pool.
///
/// Dereferences to the underlying connection. Give it back with
/// [`release`](Self::release) or discard it with
/// [`invalidate`](Self::invalidate); a handle dropped without either is
/// treated as broken and destroyed.
pub struct PooledConnection<F: ConnectionFactory> {
    entry: Option<Entry<F>>,
    pool: Arc<Pool<F>>,
    inner: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    pub(crate) fn new(entry: Entry<F>, pool: Arc<Pool<F>>, inner: Arc<PoolInner<F>>) -> Self {
        Self {
            entry: Some(entry),
            pool,
            inner,
        }
    }

    fn entry(&self) -> &Entry<F> {
        match &self.entry {
            Some(entry) => entry,
            None => unreachable!("pooled connection used after it was given back"),
        }
    }

    /// Pool-assigned identifier, unique for the lifetime of the pool.
    pub fn id(&self) -> u64 {
        self.entry().id
    }

    /// The endpoint this connection belongs to.
    pub fn endpoint(&self) -> &F::Endpoint {
        self.pool.endpoint()
    }

    /// Time since the connection was created.
    pub fn age(&self) -> Duration {
        self.entry().created_at.elapsed()
    }

    /// How many times this connection has been borrowed, this borrow included.
    pub fn borrow_count(&self) -> u64 {
        self.entry().borrow_count
    }

    /// Return the connection to its endpoint pool.
    pub async fn release(mut self) {
        if let Some(entry) = self.entry.take() {
            trace!(endpoint = %self.pool.endpoint(), id = entry.id, "Releasing connection");
            self.inner.release(&self.pool, entry).await;
        }
    }

    /// Destroy the connection and free its capacity.
    pub async fn invalidate(mut self) {
        if let Some(entry) = self.entry.take() {
            trace!(endpoint = %self.pool.endpoint(), id = entry.id, "Invalidating connection");
            self.inner.discard(&self.pool, entry).await;
        }
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = Conn<F>;

    fn deref(&self) -> &Self::Target {
        &self.entry().connection
    }
}

impl<F: ConnectionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.entry {
            Some(entry) => &mut entry.connection,
            None => unreachable!("pooled connection used after it was given back"),
        }
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            warn!(
                endpoint = %self.pool.endpoint(),
                id = entry.id,
                "Connection dropped without being released, destroying it"
            );
            self.inner.detach(&self.pool);
            self.inner
                .destroy_later(self.pool.endpoint().clone(), entry.connection);
        }
    }
}

impl<F: ConnectionFactory> fmt::Debug for PooledConnection<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("endpoint", self.pool.endpoint())
            .field("id", &self.entry.as_ref().map(|e| e.id))
            .finish()
    }
}
