//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::database::{PoolStats, Role};

use super::{
    ENDPOINT_UP, HEALTH_CHECKS_TOTAL, NON_RETRYABLE_TOTAL, POOL_CONNECTIONS, POOL_WAIT_COUNT,
    READ_ROUTED_TOTAL, RETRY_ATTEMPTS_TOTAL, RETRY_EXHAUSTED_TOTAL, SLOW_OPERATIONS_TOTAL,
    TRANSACTIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for read routing metrics
pub struct RoutingMetrics;

impl RoutingMetrics {
    /// Record which endpoint served a read handle
    pub fn record_read(role: Role) {
        READ_ROUTED_TOTAL.with_label_values(&[role.as_str()]).inc();
    }
}

/// Helper struct for retry metrics
pub struct RetryMetrics;

impl RetryMetrics {
    pub fn record_attempt() {
        RETRY_ATTEMPTS_TOTAL.inc();
    }

    pub fn record_exhausted() {
        RETRY_EXHAUSTED_TOTAL.inc();
    }

    pub fn record_non_retryable() {
        NON_RETRYABLE_TOTAL.inc();
    }
}

/// Helper struct for transaction metrics
pub struct TransactionMetrics;

impl TransactionMetrics {
    /// Record a finished transaction scope
    pub fn record(scope: &str, outcome: &str) {
        TRANSACTIONS_TOTAL.with_label_values(&[scope, outcome]).inc();
    }
}

/// Helper struct for slow operation metrics
pub struct OperationMetrics;

impl OperationMetrics {
    pub fn record_slow(kind: &str) {
        SLOW_OPERATIONS_TOTAL.with_label_values(&[kind]).inc();
    }
}

/// Helper struct for endpoint health metrics
pub struct HealthMetrics;

impl HealthMetrics {
    /// Record a liveness probe and update the endpoint gauge
    pub fn record_check(role: Role, ok: bool) {
        let result = if ok { "ok" } else { "failed" };
        HEALTH_CHECKS_TOTAL
            .with_label_values(&[role.as_str(), result])
            .inc();
        Self::set_endpoint_up(role, ok);
    }

    pub fn set_endpoint_up(role: Role, up: bool) {
        ENDPOINT_UP
            .with_label_values(&[role.as_str()])
            .set(if up { 1 } else { 0 });
    }
}

/// Helper struct for pool occupancy metrics
pub struct PoolMetrics;

impl PoolMetrics {
    /// Publish a pool stats snapshot
    pub fn update(role: Role, stats: &PoolStats) {
        let role = role.as_str();
        POOL_CONNECTIONS
            .with_label_values(&[role, "open"])
            .set(stats.open_connections as i64);
        POOL_CONNECTIONS
            .with_label_values(&[role, "in_use"])
            .set(stats.in_use as i64);
        POOL_CONNECTIONS
            .with_label_values(&[role, "idle"])
            .set(stats.idle as i64);
        POOL_WAIT_COUNT
            .with_label_values(&[role])
            .set(stats.wait_count as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_metrics_include_recorded_series() {
        RoutingMetrics::record_read(Role::Replica);
        RetryMetrics::record_attempt();
        PoolMetrics::update(
            Role::Primary,
            &PoolStats {
                open_connections: 3,
                in_use: 1,
                idle: 2,
                ..PoolStats::default()
            },
        );

        let text = encode_metrics().unwrap();
        assert!(text.contains("nutridb_read_routed_total{role=\"replica\"}"));
        assert!(text.contains("nutridb_retry_attempts_total"));
        assert!(text.contains("nutridb_pool_connections{role=\"primary\",state=\"idle\"} 2"));
    }
}
