use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::api_routes;
use crate::database::Pool;

use super::AppState;

pub fn create_app<P: Pool>(state: AppState<P>) -> Router {
    Router::new()
        .merge(api_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
