//! Probe command
//!
//! Borrows and releases TCP connections to each given server through a pool
//! built from the effective configuration, then reports latency, reuse and
//! the final pool statistics.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use corral::pool::{PoolManager, PoolStats};
use corral::transport::{ServerAddress, TcpConnectionFactory};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Arguments for the probe command
#[derive(Parser, Debug, Clone)]
pub struct ProbeArgs {
    /// Servers to probe (host:port)
    #[arg(required = true)]
    pub endpoints: Vec<String>,

    /// Borrow/release rounds per server
    #[arg(short = 'n', long, default_value = "1")]
    pub rounds: u32,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "5000")]
    pub connect_timeout: u64,
}

/// Outcome of one borrow
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub endpoint: String,
    pub round: u32,
    pub ok: bool,
    pub latency_ms: f64,
    pub reused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProbeReport<'a> {
    results: &'a [ProbeResult],
    stats: &'a PoolStats,
}

impl ProbeArgs {
    /// Execute the probe command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let factory =
            TcpConnectionFactory::new().connect_timeout(Duration::from_millis(self.connect_timeout));
        let pool = PoolManager::new(factory, ctx.pool_config.clone());

        ctx.output.banner("CORRAL PROBE");

        let mut results = Vec::new();
        for raw in &self.endpoints {
            let endpoint: ServerAddress = match raw.parse() {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    ctx.output.failed(raw, &e.to_string());
                    results.push(ProbeResult {
                        endpoint: raw.clone(),
                        round: 1,
                        ok: false,
                        latency_ms: 0.0,
                        reused: false,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            for round in 1..=self.rounds.max(1) {
                let result = probe_once(&pool, &endpoint, round).await;
                match &result.error {
                    None => ctx.output.ok(
                        &result.endpoint,
                        &format!(
                            "round {} {:.2}ms ({})",
                            round,
                            result.latency_ms,
                            if result.reused { "reused" } else { "new" }
                        ),
                    ),
                    Some(error) => ctx.output.failed(&result.endpoint, error),
                }
                results.push(result);
            }
        }

        let stats = pool.stats();
        pool.close().await;

        if ctx.output.is_structured() {
            ctx.output.document(&ProbeReport {
                results: &results,
                stats: &stats,
            })?;
        } else {
            ctx.output.section("Pool statistics");
            ctx.output.field("endpoints", stats.endpoints);
            ctx.output.field("created", stats.created);
            ctx.output.field("hits", stats.hits);
            ctx.output.field("misses", stats.misses);
            ctx.output.field("create failures", stats.create_failures);
            ctx.output.field("idle at exit", stats.idle_connections);
        }

        let failures = results.iter().filter(|r| !r.ok).count();
        Ok(if failures == 0 { 0 } else { 1 })
    }
}

async fn probe_once(
    pool: &PoolManager<TcpConnectionFactory>,
    endpoint: &ServerAddress,
    round: u32,
) -> ProbeResult {
    let started = Instant::now();
    let outcome = pool.borrow(endpoint).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(conn) => {
            let reused = conn.borrow_count() > 1;
            pool.release(conn).await;
            ProbeResult {
                endpoint: endpoint.to_string(),
                round,
                ok: true,
                latency_ms,
                reused,
                error: None,
            }
        }
        Err(e) => ProbeResult {
            endpoint: endpoint.to_string(),
            round,
            ok: false,
            latency_ms,
            reused: false,
            error: Some(e.to_string()),
        },
    }
}
