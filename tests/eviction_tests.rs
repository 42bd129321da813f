//! Eviction tests: idle-age eviction, idle validation, minimum-idle
//! maintenance, failure isolation and the background scheduler.

mod common;

use std::time::Duration;

use common::*;

async fn park(pool: &corral::PoolManager<MockFactory>, endpoint: &String, count: usize) -> Vec<u64> {
    let mut conns = Vec::new();
    for _ in 0..count {
        conns.push(pool.borrow(endpoint).await.unwrap());
    }
    let ids = conns.iter().map(|c| c.id).collect();
    for conn in conns {
        pool.release(conn).await;
    }
    ids
}

#[tokio::test]
async fn test_connections_idle_too_long_are_evicted() {
    let pool = pool_with(
        base_config()
            .min_evictable_idle_time(Duration::from_millis(50))
            .test_on_idle(false),
    );
    let a = ep("a:1");
    park(&pool, &a, 2).await;

    tokio::time::sleep(Duration::from_millis(80)).await;
    let report = pool.run_eviction().await;

    assert_eq!(report.endpoints, 1);
    assert_eq!(report.inspected, 2);
    assert_eq!(report.evicted_idle, 2);
    assert_eq!(pool.endpoint_stats(&a).unwrap().idle, 0);
    assert_eq!(pool.factory().destroyed(), 2);
    assert_eq!(pool.stats().total_connections, 0);
}

#[tokio::test]
async fn test_recently_used_connections_survive() {
    let pool = pool_with(
        base_config()
            .min_evictable_idle_time(Duration::from_secs(600))
            .test_on_idle(false),
    );
    let a = ep("a:1");
    let ids = park(&pool, &a, 2).await;

    let report = pool.run_eviction().await;
    assert_eq!(report.inspected, 2);
    assert_eq!(report.evicted(), 0);
    assert_eq!(pool.endpoint_stats(&a).unwrap().idle, 2);

    // Inspection keeps the idle order intact.
    let conn = pool.borrow(&a).await.unwrap();
    assert_eq!(conn.id, ids[1]);
    pool.release(conn).await;
}

#[tokio::test]
async fn test_sweep_inspects_oldest_first_within_budget() {
    let pool = pool_with(
        base_config()
            .min_evictable_idle_time(Duration::from_millis(30))
            .num_tests_per_eviction_run(1)
            .test_on_idle(false),
    );
    let a = ep("a:1");
    let ids = park(&pool, &a, 3).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let report = pool.run_eviction().await;
    assert_eq!(report.inspected, 1);
    assert_eq!(report.evicted_idle, 1);
    assert_eq!(pool.endpoint_stats(&a).unwrap().idle, 2);

    // The longest-idle connection went first; LIFO still hands out the newest.
    let conn = pool.borrow(&a).await.unwrap();
    assert_eq!(conn.id, ids[2]);
    pool.release(conn).await;
}

#[tokio::test]
async fn test_zero_tests_per_run_inspects_nothing() {
    let pool = pool_with(
        base_config()
            .min_evictable_idle_time(Duration::from_millis(1))
            .num_tests_per_eviction_run(0),
    );
    let a = ep("a:1");
    park(&pool, &a, 2).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    let report = pool.run_eviction().await;
    assert_eq!(report.inspected, 0);
    assert_eq!(pool.endpoint_stats(&a).unwrap().idle, 2);
}

#[tokio::test]
async fn test_idle_validation_evicts_dead_connections() {
    let pool = pool_with(base_config().test_on_idle(true));
    let a = ep("a:1");
    let ids = park(&pool, &a, 2).await;
    pool.factory().kill(ids[0]);

    let report = pool.run_eviction().await;
    assert_eq!(report.evicted_invalid, 1);
    assert_eq!(report.evicted_idle, 0);

    let stats = pool.endpoint_stats(&a).unwrap();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(pool.factory().destroyed(), 1);
    assert_eq!(pool.stats().total_connections, 1);
}

#[tokio::test]
async fn test_min_idle_is_restored() {
    let pool = pool_with(base_config().min_idle(3));
    let a = ep("a:1");
    park(&pool, &a, 1).await;

    let report = pool.run_eviction().await;
    assert_eq!(report.created, 2);
    assert_eq!(pool.endpoint_stats(&a).unwrap().idle, 3);

    // Already at the floor: nothing more to do.
    let report = pool.run_eviction().await;
    assert_eq!(report.created, 0);
}

#[tokio::test]
async fn test_min_idle_is_capped_by_max_active() {
    let pool = pool_with(base_config().min_idle(5).max_active(2));
    let a = ep("a:1");
    park(&pool, &a, 1).await;

    pool.run_eviction().await;
    assert_eq!(pool.endpoint_stats(&a).unwrap().idle, 2);
}

#[tokio::test]
async fn test_min_idle_is_capped_by_max_total() {
    let pool = pool_with(base_config().min_idle(4).max_total(3));
    let a = ep("a:1");
    let b = ep("b:1");
    park(&pool, &a, 1).await;
    park(&pool, &b, 1).await;

    pool.run_eviction().await;
    assert_eq!(pool.stats().total_connections, 3);
}

#[tokio::test]
async fn test_top_up_failure_does_not_stop_other_endpoints() {
    let pool = pool_with(base_config().min_idle(2));
    let up = ep("up:1");
    let down = ep("down:1");
    park(&pool, &up, 1).await;
    park(&pool, &down, 1).await;
    pool.factory().fail_endpoint("down:1");

    let report = pool.run_eviction().await;
    assert_eq!(report.endpoints, 2);
    assert_eq!(report.create_failures, 1);
    assert_eq!(report.created, 1);
    assert_eq!(pool.endpoint_stats(&up).unwrap().idle, 2);
    assert_eq!(pool.endpoint_stats(&down).unwrap().idle, 1);
}

#[tokio::test]
async fn test_panicking_sweep_is_isolated() {
    let pool = pool_with(base_config().test_on_idle(true));
    let good = ep("good:1");
    let bad = ep("bad:1");
    park(&pool, &good, 1).await;
    park(&pool, &bad, 1).await;
    pool.factory().explode_on_validate("bad:1");

    let report = pool.run_eviction().await;
    assert_eq!(report.endpoints, 2);
    assert_eq!(report.failed_endpoints, 1);
    assert_eq!(pool.endpoint_stats(&good).unwrap().idle, 1);

    // The connection lost in the panic no longer counts against the limits.
    let stats = pool.endpoint_stats(&bad).unwrap();
    assert_eq!(stats.active, 0);
    assert_eq!(pool.stats().total_connections, 1);
}

#[tokio::test]
async fn test_checked_out_connections_are_not_evicted() {
    let pool = pool_with(base_config().min_evictable_idle_time(Duration::from_millis(1)));
    let a = ep("a:1");
    let conn = pool.borrow(&a).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let report = pool.run_eviction().await;
    assert_eq!(report.inspected, 0);
    assert_eq!(pool.factory().destroyed(), 0);
    pool.release(conn).await;
}

// ============================================================================
// Scheduler
// ============================================================================

#[tokio::test]
async fn test_scheduler_sweeps_periodically() {
    let pool = pool_with(
        base_config()
            .eviction_interval(Duration::from_millis(25))
            .min_evictable_idle_time(Duration::from_millis(20))
            .test_on_idle(false),
    );
    assert!(pool.is_eviction_running());
    let a = ep("a:1");
    park(&pool, &a, 2).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pool.endpoint_stats(&a).unwrap().idle, 0);
    assert_eq!(pool.factory().destroyed(), 2);

    pool.close().await;
    assert!(!pool.is_eviction_running());
}

#[tokio::test]
async fn test_scheduler_disabled_without_interval() {
    let pool = pool_with(base_config().eviction_interval_millis(0));
    assert!(!pool.is_eviction_running());

    let pool = pool_with(base_config().eviction_interval_millis(-1));
    assert!(!pool.is_eviction_running());
}
