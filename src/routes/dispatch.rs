//! The dispatcher mounted as the router fallback, so routing stays with the route table.

use crate::handlers::dispatch;
use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

pub fn dispatch_routes(state: AppState) -> Router {
    let limit = state.dispatcher.config().dispatcher.body_limit_bytes;
    Router::new()
        .fallback(dispatch)
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
