//! Keyed connection pooling.
//!
//! The pool keeps one sub-pool per endpoint. Each sub-pool holds idle
//! connections ready for reuse, counts the connections checked out of it and
//! queues borrowers that have to wait. The manager enforces the per-endpoint
//! and global limits, and a background scheduler evicts connections that sat
//! idle too long or no longer pass validation.
//!
//! ```text
//!            PoolManager ── maxTotal, global waiters
//!           /     |     \
//!   EndpointPool EndpointPool ...  ── idle queue, active count, waiters
//!                     ^
//!        EvictionScheduler (weak) ── periodic sweeps, minIdle top-up
//! ```

mod endpoint;
mod eviction;
mod handle;
mod manager;
mod stats;

pub use eviction::EvictionReport;
pub use handle::PooledConnection;
pub use manager::{PoolManager, PrewarmResult};
pub use stats::{EndpointStats, PoolStats};
