use axum::{routing::get, Router};

use crate::database::Pool;
use crate::server::AppState;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes<P: Pool>() -> Router<AppState<P>> {
    Router::new()
        .route("/health", get(health::<P>))
        .route("/stats", get(stats::<P>))
        .route("/metrics", get(prometheus_metrics::<P>))
}
