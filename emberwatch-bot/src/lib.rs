pub mod chart;
pub mod config;
pub mod discord;
mod error;
pub mod helpers;
pub mod panel;
pub mod playerlist;
pub mod reconciler;
mod routes;

use axum::{Router, http::StatusCode, routing::get};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Both routes are GET-only; anything with a body is malformed.
const REQUEST_BODY_LIMIT: usize = 1024;

pub struct AppState {
    pub db: emberwatch_db::Database,
}

/// Create the introspection router with the given database
pub fn create_app(db: emberwatch_db::Database, request_timeout: Duration) -> Router {
    let state = Arc::new(AppState { db });

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/statuses", get(routes::statuses))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(REQUEST_BODY_LIMIT))
        .with_state(state)
}
