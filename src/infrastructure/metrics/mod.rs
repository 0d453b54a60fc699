//! Prometheus metrics for the database layer.
//!
//! - Routing metrics (which endpoint served reads)
//! - Retry metrics (attempts, exhaustion, non-retryable failures)
//! - Transaction outcomes and slow operations
//! - Endpoint health and pool occupancy

mod helpers;

pub use helpers::{
    encode_metrics, HealthMetrics, OperationMetrics, PoolMetrics, RetryMetrics, RoutingMetrics,
    TransactionMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge_vec, IntCounter,
    IntCounterVec, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "nutridb";

lazy_static! {
    // ============================================================================
    // Routing Metrics
    // ============================================================================

    /// Read handles handed out, by endpoint
    pub static ref READ_ROUTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_read_routed_total", METRIC_PREFIX),
        "Read handles handed out by endpoint",
        &["role"]
    ).unwrap();

    // ============================================================================
    // Retry Metrics
    // ============================================================================

    /// Retries scheduled after a retryable failure
    pub static ref RETRY_ATTEMPTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_retry_attempts_total", METRIC_PREFIX),
        "Retries scheduled after a retryable failure"
    ).unwrap();

    /// Operations that failed on every attempt
    pub static ref RETRY_EXHAUSTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_retry_exhausted_total", METRIC_PREFIX),
        "Operations that failed on every allowed attempt"
    ).unwrap();

    /// Operations returned immediately because the error cannot be retried
    pub static ref NON_RETRYABLE_TOTAL: IntCounter = register_int_counter!(
        format!("{}_non_retryable_total", METRIC_PREFIX),
        "Operations that failed with a non-retryable error"
    ).unwrap();

    // ============================================================================
    // Transaction Metrics
    // ============================================================================

    /// Transactions by scope and outcome
    pub static ref TRANSACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_transactions_total", METRIC_PREFIX),
        "Transactions by scope and outcome",
        &["scope", "outcome"]
    ).unwrap();

    /// Operations slower than the configured threshold
    pub static ref SLOW_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_slow_operations_total", METRIC_PREFIX),
        "Operations slower than the slow-query threshold",
        &["kind"]
    ).unwrap();

    // ============================================================================
    // Health Metrics
    // ============================================================================

    /// Liveness probes by endpoint and result
    pub static ref HEALTH_CHECKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_health_checks_total", METRIC_PREFIX),
        "Liveness probes by endpoint and result",
        &["role", "result"]
    ).unwrap();

    /// Endpoint status (1 = last probe succeeded, 0 = failed or closed)
    pub static ref ENDPOINT_UP: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_endpoint_up", METRIC_PREFIX),
        "Endpoint status (1=up, 0=down)",
        &["role"]
    ).unwrap();

    // ============================================================================
    // Pool Metrics
    // ============================================================================

    /// Pool connections by endpoint and state (open, in_use, idle)
    pub static ref POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_pool_connections", METRIC_PREFIX),
        "Pool connections by endpoint and state",
        &["role", "state"]
    ).unwrap();

    /// Acquisitions that had to wait for a free connection
    pub static ref POOL_WAIT_COUNT: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_pool_wait_count", METRIC_PREFIX),
        "Acquisitions that waited for a free connection",
        &["role"]
    ).unwrap();
}
