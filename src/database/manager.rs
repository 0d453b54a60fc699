//! Primary/replica database manager.
//!
//! Owns one primary pool and at most one replica pool, routes reads and
//! writes between them, and runs the background health checker.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{DbError, DriverError};
use crate::metrics::{HealthMetrics, OperationMetrics, PoolMetrics, RoutingMetrics};

use super::config::ManagerConfig;
use super::driver::{mask_url, Connector, DbHandle, Pool, PoolStats, Role};
use super::health::{
    EndpointHealth, EndpointHealthStats, EndpointReport, HealthChecker, HealthProbe, HealthReport,
};
use super::migrate::Migratable;
use super::retry::RetryPolicy;
use super::transaction::{run_in_transaction, TxScope};

/// Pool metrics per endpoint. Never carries connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub primary: PoolStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica: Option<PoolStats>,
}

impl DatabaseStats {
    pub fn get(&self, role: Role) -> Option<&PoolStats> {
        match role {
            Role::Primary => Some(&self.primary),
            Role::Replica => self.replica.as_ref(),
        }
    }
}

struct ManagerInner<P: Pool> {
    config: ManagerConfig,
    retry: RetryPolicy,
    primary: P,
    replica: Option<P>,
    primary_health: EndpointHealth,
    replica_health: EndpointHealth,
    closed: AtomicBool,
    shutdown: CancellationToken,
    checker: HealthChecker,
}

impl<P: Pool> ManagerInner<P> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn health_of(&self, role: Role) -> &EndpointHealth {
        match role {
            Role::Primary => &self.primary_health,
            Role::Replica => &self.replica_health,
        }
    }

    /// Ping `pool` within the health-check timeout and record the outcome.
    async fn probe(&self, role: Role, pool: &P) -> Result<Duration, DriverError> {
        let timeout = self.config.health_check_timeout;
        let started = Instant::now();

        let result = match tokio::time::timeout(timeout, pool.ping()).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::timeout(format!(
                "{} ping exceeded {}ms",
                role,
                timeout.as_millis()
            ))),
        };

        let health = self.health_of(role);
        match &result {
            Ok(()) => health.record_success(),
            Err(_) => health.record_failure(),
        }
        HealthMetrics::record_check(role, result.is_ok());

        result.map(|()| started.elapsed())
    }

    fn report(&self, role: Role, outcome: &Result<Duration, DriverError>) -> EndpointReport {
        let EndpointHealthStats {
            status,
            last_success_ms,
            consecutive_failures,
            ..
        } = self.health_of(role).stats();

        EndpointReport {
            role,
            status,
            latency_ms: outcome.as_ref().ok().map(|d| d.as_millis() as u64),
            error: outcome.as_ref().err().map(|e| e.to_string()),
            consecutive_failures,
            last_success_ms,
        }
    }

    async fn check_health(&self) -> Result<HealthReport, DbError> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }

        let primary_outcome = self.probe(Role::Primary, &self.primary).await;
        let primary = self.report(Role::Primary, &primary_outcome);
        if let Err(e) = primary_outcome {
            return Err(DbError::UnhealthyPrimary(e));
        }

        let replica = match &self.replica {
            Some(pool) => {
                let outcome = self.probe(Role::Replica, pool).await;
                let report = self.report(Role::Replica, &outcome);
                if let Err(e) = outcome {
                    let degraded = DbError::ReplicaDegraded(e);
                    tracing::warn!(error = %degraded, "Read replica health check failed");
                }
                Some(report)
            }
            None => None,
        };

        Ok(HealthReport {
            checked_at: Utc::now(),
            primary,
            replica,
        })
    }

    fn note_slow(&self, kind: &'static str, elapsed: Duration) {
        if elapsed > self.config.slow_threshold {
            OperationMetrics::record_slow(kind);
            tracing::warn!(
                kind = kind,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.slow_threshold.as_millis() as u64,
                "Slow database operation"
            );
        }
    }
}

#[async_trait]
impl<P: Pool> HealthProbe for ManagerInner<P> {
    async fn check(&self) -> Result<HealthReport, DbError> {
        self.check_health().await
    }
}

/// Routes reads and writes across a primary and an optional read replica.
///
/// Cheap to clone; clones share the same pools. The manager is `Open` from
/// [`open`](Self::open) until [`close`](Self::close); afterwards every
/// operation fails with [`DbError::Closed`].
pub struct DatabaseManager<P: Pool> {
    inner: Arc<ManagerInner<P>>,
}

impl<P: Pool> Clone for DatabaseManager<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Pool> DatabaseManager<P> {
    /// Open the primary (required) and replica (optional) pools and start
    /// the health checker.
    ///
    /// Fails with [`DbError::Connection`] when the primary cannot be reached.
    /// A replica that cannot be reached is logged and left out.
    pub async fn open<C>(config: ManagerConfig, connector: &C) -> Result<Self, DbError>
    where
        C: Connector<Pool = P>,
    {
        let options = config.pool_options();

        let primary = connector
            .connect(Role::Primary, &config.database_url, &options)
            .await
            .map_err(|source| {
                tracing::error!(
                    url = %mask_url(&config.database_url),
                    error = %source,
                    "Failed to connect to primary database"
                );
                DbError::Connection {
                    role: Role::Primary,
                    source,
                }
            })?;

        let replica = match config.replica_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => match connector.connect(Role::Replica, url, &options).await {
                Ok(pool) => Some(pool),
                Err(e) => {
                    tracing::warn!(
                        url = %mask_url(url),
                        error = %e,
                        "Failed to connect to read replica, continuing without it"
                    );
                    None
                }
            },
            None => None,
        };

        let shutdown = CancellationToken::new();
        let inner = Arc::new(ManagerInner {
            retry: config.retry_policy(),
            primary,
            replica,
            primary_health: EndpointHealth::new(),
            replica_health: EndpointHealth::new(),
            closed: AtomicBool::new(false),
            checker: HealthChecker::new(shutdown.child_token()),
            shutdown,
            config,
        });

        inner.primary_health.record_success();
        HealthMetrics::set_endpoint_up(Role::Primary, true);
        if inner.replica.is_some() {
            inner.replica_health.record_success();
            HealthMetrics::set_endpoint_up(Role::Replica, true);
        }

        inner
            .checker
            .start(Arc::downgrade(&inner), inner.config.health_check_interval);

        tracing::info!(
            backend = inner.primary.backend(),
            primary = %mask_url(&inner.config.database_url),
            replica = inner.replica.is_some(),
            max_open_connections = inner.config.max_open_connections,
            "Database manager opened"
        );

        Ok(Self { inner })
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        if self.inner.is_closed() {
            return Err(DbError::Closed);
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &'static str {
        self.inner.primary.backend()
    }

    /// Whether a replica pool was opened.
    pub fn has_replica(&self) -> bool {
        self.inner.replica.is_some()
    }

    pub fn health_checker_running(&self) -> bool {
        self.inner.checker.is_running()
    }

    /// Health counters for one endpoint, if it exists.
    pub fn endpoint_health(&self, role: Role) -> Option<EndpointHealthStats> {
        match role {
            Role::Replica if self.inner.replica.is_none() => None,
            _ => Some(self.inner.health_of(role).stats()),
        }
    }

    /// Handle for reads.
    ///
    /// Pings the replica on every call and returns it when the ping succeeds
    /// within the health-check timeout; otherwise returns the primary.
    pub async fn read_handle(&self) -> Result<DbHandle<P>, DbError> {
        self.ensure_open()?;

        if let Some(replica) = &self.inner.replica {
            match self.inner.probe(Role::Replica, replica).await {
                Ok(_) => {
                    RoutingMetrics::record_read(Role::Replica);
                    return Ok(DbHandle::new(Role::Replica, replica.clone()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Read replica unhealthy, falling back to primary");
                }
            }
            self.ensure_open()?;
        }

        RoutingMetrics::record_read(Role::Primary);
        Ok(DbHandle::new(Role::Primary, self.inner.primary.clone()))
    }

    /// Handle for writes; always the primary, never probed.
    pub fn write_handle(&self) -> Result<DbHandle<P>, DbError> {
        self.ensure_open()?;
        Ok(DbHandle::new(Role::Primary, self.inner.primary.clone()))
    }

    /// The primary pool.
    pub fn primary(&self) -> Result<DbHandle<P>, DbError> {
        self.write_handle()
    }

    /// Probe the primary, then the replica.
    ///
    /// Fails with [`DbError::UnhealthyPrimary`] when the primary does not
    /// answer. A failing replica is logged and marked degraded in the report.
    pub async fn health(&self) -> Result<HealthReport, DbError> {
        self.ensure_open()?;
        self.inner.check_health().await
    }

    pub fn stats(&self) -> Result<DatabaseStats, DbError> {
        self.ensure_open()?;

        let primary = self.inner.primary.stats();
        PoolMetrics::update(Role::Primary, &primary);

        let replica = self.inner.replica.as_ref().map(|pool| {
            let stats = pool.stats();
            PoolMetrics::update(Role::Replica, &stats);
            stats
        });

        Ok(DatabaseStats { primary, replica })
    }

    /// Run `op` under the configured retry policy.
    ///
    /// Closing the manager aborts a pending backoff with [`DbError::Closed`].
    pub async fn retry_operation<T, E, F, Fut>(&self, op: F) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<DbError>,
    {
        self.ensure_open()?;

        let started = Instant::now();
        let result = match self.inner.retry.execute(op, &self.inner.shutdown).await {
            Err(DbError::Canceled) if self.is_closed() => Err(DbError::Closed),
            result => result,
        };
        self.inner.note_slow("retry_operation", started.elapsed());
        result
    }

    /// Run `f` in a transaction on the primary.
    pub async fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        T: Send,
        E: From<DbError> + Send,
        F: for<'t> FnOnce(&'t mut P::Tx) -> BoxFuture<'t, Result<T, E>> + Send,
    {
        self.ensure_open()?;

        let started = Instant::now();
        let result = run_in_transaction(&self.inner.primary, TxScope::Write, f).await;
        self.inner.note_slow("transaction", started.elapsed());
        result
    }

    /// Run `f` in a read-only transaction on the handle `read_handle` picks.
    ///
    /// The database rejects writes inside the scope.
    pub async fn replica_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        T: Send,
        E: From<DbError> + Send,
        F: for<'t> FnOnce(&'t mut P::Tx) -> BoxFuture<'t, Result<T, E>> + Send,
    {
        let handle = self.read_handle().await?;

        let started = Instant::now();
        let result = run_in_transaction(handle.pool(), TxScope::ReadOnly, f).await;
        self.inner.note_slow("replica_transaction", started.elapsed());
        result
    }

    /// Bring each schema up to date on the primary, in order, with retry.
    pub async fn migrate(&self, schemas: &[&dyn Migratable<P>]) -> Result<(), DbError> {
        self.ensure_open()?;
        let pool = &self.inner.primary;

        for schema in schemas {
            self.retry_operation(|| schema.migrate(pool)).await?;
            tracing::info!(schema = schema.name(), "Schema migrated");
        }
        Ok(())
    }

    /// Create each schema's table on the primary, in order, with retry.
    pub async fn create_tables(&self, schemas: &[&dyn Migratable<P>]) -> Result<(), DbError> {
        self.ensure_open()?;
        let pool = &self.inner.primary;

        for schema in schemas {
            self.retry_operation(|| schema.create_table(pool)).await?;
            tracing::info!(schema = schema.name(), "Table created");
        }
        Ok(())
    }

    /// Await `fut` unless `token` fires first.
    ///
    /// On cancellation `fut` is dropped, which returns any connection it
    /// holds to its pool, and [`DbError::Canceled`] is returned. Closing the
    /// manager cancels with [`DbError::Closed`].
    pub async fn cancellable<T, F>(&self, token: &CancellationToken, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        self.ensure_open()?;

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(DbError::Canceled),
            _ = self.inner.shutdown.cancelled() => Err(DbError::Closed),
            result = fut => result,
        }
    }

    /// Stop the health checker and close both pools.
    ///
    /// Idempotent: later calls return `Ok(())` without doing anything.
    pub async fn close(&self) -> Result<(), DbError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.inner.shutdown.cancel();
        self.inner.checker.stop().await;

        self.inner.primary.close().await;
        HealthMetrics::set_endpoint_up(Role::Primary, false);
        if let Some(replica) = &self.inner.replica {
            replica.close().await;
            HealthMetrics::set_endpoint_up(Role::Replica, false);
        }

        tracing::info!("Database connections closed");
        Ok(())
    }
}

impl<P: Pool> std::fmt::Debug for DatabaseManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseManager")
            .field("backend", &self.inner.primary.backend())
            .field("replica", &self.inner.replica.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}
