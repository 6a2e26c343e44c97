use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use super::routes;
use super::state::ServerState;

/// Router with every popgate route.
pub fn create_app(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/reader", get(routes::query).post(routes::acknowledge))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
