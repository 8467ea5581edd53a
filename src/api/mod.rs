//! HTTP API.
//!
//! Routes mirror the engine operations one-to-one. Success bodies are
//! wrapped as `{"data": ...}`, failures as `{"error": {"code", "message"}}`.

pub mod error;
pub mod handlers;

use crate::services::AssignmentEngine;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::ApiErr;

/// Shared state for the axum routes.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: AssignmentEngine,
}

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/team/add", post(handlers::create_team))
        .route("/team/get", get(handlers::get_team))
        .route("/users/setIsActive", post(handlers::set_user_active))
        .route("/users/getReview", get(handlers::get_user_reviews))
        .route("/pullRequest/create", post(handlers::create_pr))
        .route("/pullRequest/merge", post(handlers::merge_pr))
        .route("/pullRequest/reassign", post(handlers::reassign_reviewer))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
