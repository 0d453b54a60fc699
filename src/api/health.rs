//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::database::{DatabaseStats, HealthReport, Pool};
use crate::error::DbError;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when only the replica is failing
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub backend: String,
    pub database: HealthReport,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub pools: DatabaseStats,
}

/// GET /health - 503 when the primary is unreachable or the manager is closed
pub async fn health<P: Pool>(
    State(state): State<AppState<P>>,
) -> Result<Json<HealthResponse>, DbError> {
    let report = state.manager.health().await?;
    let status = if report.replica_degraded() {
        "degraded"
    } else {
        "healthy"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        backend: state.manager.backend().to_string(),
        database: report,
    }))
}

/// GET /stats - pool counters per endpoint
pub async fn stats<P: Pool>(
    State(state): State<AppState<P>>,
) -> Result<Json<StatsResponse>, DbError> {
    let pools = state.manager.stats()?;

    Ok(Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        pools,
    }))
}
