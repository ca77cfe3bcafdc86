pub mod health;
pub mod interviews;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Interview session boundary
        .route("/api/v1/interviews", post(interviews::handle_create))
        .route(
            "/api/v1/interviews/:id/next-question",
            get(interviews::handle_next_question),
        )
        .route(
            "/api/v1/interviews/:id/answer",
            post(interviews::handle_answer),
        )
        .route(
            "/api/v1/interviews/:id/status",
            get(interviews::handle_status),
        )
        .route("/api/v1/interviews/:id", delete(interviews::handle_delete))
        .with_state(state)
}
