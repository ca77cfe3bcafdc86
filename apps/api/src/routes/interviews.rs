//! Interview session handlers — the thin HTTP skin over the engine.
//! All flow logic lives in `interview::engine`; handlers only translate.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::engine::{SessionStatus, TurnOutput};
use crate::retrieval::KnowledgeChunk;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateInterviewRequest {
    pub resume: String,
    pub job_description: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Optional per-session question bank; builds a private retrieval index.
    #[serde(default)]
    pub knowledge: Option<Vec<KnowledgeChunk>>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

/// POST /api/v1/interviews
/// Creates a session and advances straight to the first question.
pub async fn handle_create(
    State(state): State<AppState>,
    Json(req): Json<CreateInterviewRequest>,
) -> Result<Json<TurnOutput>, AppError> {
    let id = state
        .engine
        .create_session(
            req.resume,
            req.job_description,
            req.role.unwrap_or_default(),
            req.knowledge,
        )
        .await?;
    let output = state.engine.advance(id).await?;
    Ok(Json(output))
}

/// GET /api/v1/interviews/:id/next-question
#[axum::debug_handler]
pub async fn handle_next_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TurnOutput>, AppError> {
    Ok(Json(state.engine.advance(id).await?))
}

/// POST /api/v1/interviews/:id/answer
pub async fn handle_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<TurnOutput>, AppError> {
    Ok(Json(state.engine.submit_answer(id, &req.answer).await?))
}

/// GET /api/v1/interviews/:id/status
pub async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>, AppError> {
    Ok(Json(state.engine.status(id).await?))
}

/// DELETE /api/v1/interviews/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_session(id)?;
    Ok(StatusCode::NO_CONTENT)
}
