//! Endpoint health tracking and the background health checker.
//!
//! Routing never reads this state; `read_handle` probes on demand. The
//! checker only feeds logs, metrics and the `/health` report.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::DbError;

use super::driver::Role;

/// Get current time in milliseconds since epoch
pub(crate) fn current_time_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Last observed state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum EndpointStatus {
    Unknown = 0,
    Healthy = 1,
    Degraded = 2,
}

impl From<u8> for EndpointStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => EndpointStatus::Healthy,
            2 => EndpointStatus::Degraded,
            _ => EndpointStatus::Unknown,
        }
    }
}

impl EndpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointStatus::Unknown => "unknown",
            EndpointStatus::Healthy => "healthy",
            EndpointStatus::Degraded => "degraded",
        }
    }

    pub fn is_healthy(&self) -> bool {
        *self == EndpointStatus::Healthy
    }
}

/// Lock-free health counters for one endpoint.
pub struct EndpointHealth {
    status: AtomicU8,
    last_success_ms: AtomicI64,
    consecutive_failures: AtomicU32,
    total_checks: AtomicU64,
}

impl EndpointHealth {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(EndpointStatus::Unknown as u8),
            last_success_ms: AtomicI64::new(0),
            consecutive_failures: AtomicU32::new(0),
            total_checks: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self) {
        self.status
            .store(EndpointStatus::Healthy as u8, Ordering::Release);
        self.last_success_ms
            .store(current_time_ms(), Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Release);
        self.total_checks.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_failure(&self) {
        self.status
            .store(EndpointStatus::Degraded as u8, Ordering::Release);
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel);
        self.total_checks.fetch_add(1, Ordering::AcqRel);
    }

    pub fn status(&self) -> EndpointStatus {
        EndpointStatus::from(self.status.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> EndpointHealthStats {
        EndpointHealthStats {
            status: self.status(),
            last_success_ms: self.last_success_ms.load(Ordering::Acquire),
            consecutive_failures: self.consecutive_failures.load(Ordering::Acquire),
            total_checks: self.total_checks.load(Ordering::Acquire),
        }
    }
}

impl Default for EndpointHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointHealthStats {
    pub status: EndpointStatus,
    pub last_success_ms: i64,
    pub consecutive_failures: u32,
    pub total_checks: u64,
}

/// Result of probing one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    pub role: Role,
    pub status: EndpointStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub consecutive_failures: u32,
    pub last_success_ms: i64,
}

/// Outcome of [`DatabaseManager::health`](super::DatabaseManager::health).
///
/// Only produced when the primary answered; a degraded replica is reported
/// here rather than failing the call.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub primary: EndpointReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica: Option<EndpointReport>,
}

impl HealthReport {
    pub fn replica_degraded(&self) -> bool {
        self.replica
            .as_ref()
            .is_some_and(|r| r.status == EndpointStatus::Degraded)
    }
}

/// Something the health checker can poll.
#[async_trait]
pub(crate) trait HealthProbe: Send + Sync + 'static {
    async fn check(&self) -> Result<HealthReport, DbError>;
}

/// Handle to the background health-check task.
pub(crate) struct HealthChecker {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
}

impl HealthChecker {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            handle: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the loop. The probe is held weakly so a dropped manager ends it.
    pub(crate) fn start<H: HealthProbe>(&self, probe: Weak<H>, interval: Duration) {
        let cancel = self.cancel.clone();
        let running = self.running.clone();
        running.store(true, Ordering::Release);

        let handle = tokio::spawn(async move {
            run(probe, interval, cancel).await;
            running.store(false, Ordering::Release);
        });

        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(handle);
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signal the loop and wait for it to exit.
    pub(crate) async fn stop(&self) {
        self.cancel.cancel();

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Health checker task ended abnormally");
            }
        }
        self.running.store(false, Ordering::Release);
    }
}

async fn run<H: HealthProbe>(probe: Weak<H>, interval: Duration, cancel: CancellationToken) {
    let interval = interval.max(Duration::from_millis(1));
    let mut timer = tokio::time::interval(interval);
    // A slow probe delays the next one instead of stacking ticks
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip immediate first tick
    timer.tick().await;

    tracing::info!(
        interval_ms = interval.as_millis() as u64,
        "Database health checker started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {
                let Some(probe) = probe.upgrade() else {
                    break;
                };

                let outcome = tokio::select! {
                    _ = cancel.cancelled() => break,
                    outcome = probe.check() => outcome,
                };

                match outcome {
                    Ok(report) => {
                        tracing::debug!(
                            primary_latency_ms = report.primary.latency_ms,
                            replica_degraded = report.replica_degraded(),
                            "Database health check passed"
                        );
                    }
                    Err(DbError::Closed) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Database health check failed");
                    }
                }
            }
        }
    }

    tracing::info!("Database health checker stopped");
}
