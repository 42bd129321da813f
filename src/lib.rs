//! # Corral - keyed connection pooling
//!
//! Corral keeps reusable client connections to a set of remote servers,
//! one sub-pool per server address. It bounds how many connections exist per
//! server and in total, makes borrowers fail or wait when a bound is reached,
//! optionally validates connections on borrow, return and while idle, and
//! evicts connections that have been idle too long.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         PoolManager                          │
//! │        borrow / release / invalidate / remove_endpoint       │
//! └──────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────┐  ┌─────────────────┐  ┌───────────────────┐
//! │  EndpointPool   │  │  EndpointPool   │  │ EvictionScheduler │
//! │ idle + waiters  │  │ idle + waiters  │  │  periodic sweeps  │
//! └─────────────────┘  └─────────────────┘  └───────────────────┘
//!          │                    │
//!          └─────────┬──────────┘
//!                    ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                ConnectionFactory (transport)                 │
//! │                  create / validate / destroy                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use corral::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PoolConfig::builder()
//!         .max_active(8)
//!         .max_wait(std::time::Duration::from_secs(2))
//!         .build()?;
//!     let pool = PoolManager::new(TcpConnectionFactory::new(), config);
//!
//!     let server: ServerAddress = "cache1:11222".parse()?;
//!     let conn = pool.borrow(&server).await?;
//!     // ... talk to the server ...
//!     pool.release(conn).await;
//!
//!     pool.close().await;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod factory;
pub mod pool;
pub mod telemetry;
pub mod transport;

pub mod prelude {
    //! Convenient re-exports of the types most callers need.

    pub use crate::config::{ExhaustedAction, PoolConfig, PoolConfigBuilder};
    pub use crate::error::{ConnectError, PoolError, Result};
    pub use crate::factory::ConnectionFactory;
    pub use crate::pool::{
        EndpointStats, EvictionReport, PoolManager, PoolStats, PooledConnection, PrewarmResult,
    };
    pub use crate::transport::{ServerAddress, TcpConnectionFactory};

    pub use async_trait::async_trait;
}

pub use config::{ExhaustedAction, PoolConfig, PoolConfigBuilder};
pub use error::{ConnectError, PoolError, Result};
pub use factory::ConnectionFactory;
pub use pool::{PoolManager, PooledConnection};
