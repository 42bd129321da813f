//! Shared test utilities for the corral test suite.
//!
//! This module provides:
//! - A scriptable [`MockFactory`] that can refuse endpoints, mark connections
//!   dead, slow down creation and blow up during validation
//! - Configuration helpers with background eviction disabled
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use corral::config::PoolConfigBuilder;
use corral::error::ConnectError;
use corral::factory::ConnectionFactory;
use corral::pool::PoolManager;
use corral::PoolConfig;

// ============================================================================
// Mock Factory
// ============================================================================

/// A connection handed out by [`MockFactory`].
#[derive(Debug)]
pub struct MockConnection {
    pub id: u64,
    pub endpoint: String,
}

/// Connection factory whose behavior tests can script.
#[derive(Default)]
pub struct MockFactory {
    next_id: AtomicU64,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    validations: AtomicUsize,
    all_dead: AtomicBool,
    create_delay_ms: AtomicU64,
    failing: Mutex<HashSet<String>>,
    dead: Mutex<HashSet<u64>>,
    exploding: Mutex<HashSet<String>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every `create` for `endpoint`.
    pub fn fail_endpoint(&self, endpoint: &str) {
        self.failing.lock().insert(endpoint.to_string());
    }

    pub fn heal_endpoint(&self, endpoint: &str) {
        self.failing.lock().remove(endpoint);
    }

    /// Make the connection with this factory id fail validation.
    pub fn kill(&self, id: u64) {
        self.dead.lock().insert(id);
    }

    /// Make every connection fail validation.
    pub fn kill_all(&self, dead: bool) {
        self.all_dead.store(dead, Ordering::SeqCst);
    }

    /// Panic inside `validate` for connections of `endpoint`.
    pub fn explode_on_validate(&self, endpoint: &str) {
        self.exploding.lock().insert(endpoint.to_string());
    }

    pub fn set_create_delay(&self, delay: Duration) {
        self.create_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn validations(&self) -> usize {
        self.validations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    type Endpoint = String;
    type Connection = MockConnection;

    async fn create(&self, endpoint: &String) -> Result<MockConnection, ConnectError> {
        let delay = self.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.lock().contains(endpoint) {
            return Err(ConnectError::Refused(endpoint.clone()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            endpoint: endpoint.clone(),
        })
    }

    async fn validate(&self, endpoint: &String, connection: &MockConnection) -> bool {
        self.validations.fetch_add(1, Ordering::SeqCst);
        if self.exploding.lock().contains(endpoint) {
            panic!("validation exploded for {endpoint}");
        }
        !self.all_dead.load(Ordering::SeqCst) && !self.dead.lock().contains(&connection.id)
    }

    async fn destroy(&self, _endpoint: &String, _connection: MockConnection) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Defaults with the eviction scheduler off and no idle floor, so that
/// tests only see the operations they perform.
pub fn base_config() -> PoolConfigBuilder {
    PoolConfig::builder()
        .eviction_interval_millis(0)
        .min_idle(0)
}

pub fn pool_with(config: PoolConfigBuilder) -> PoolManager<MockFactory> {
    PoolManager::new(MockFactory::new(), config.build().unwrap())
}

pub fn ep(name: &str) -> String {
    name.to_string()
}

/// Give spawned tasks a chance to run up to their next await point.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
