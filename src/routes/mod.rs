pub mod common;
pub mod dispatch;

pub use common::common_routes;
pub use dispatch::dispatch_routes;

use crate::state::AppState;
use axum::Router;

/// Health and version routes plus the dispatcher fallback.
pub fn app(state: AppState) -> Router {
    common_routes().merge(dispatch_routes(state))
}
