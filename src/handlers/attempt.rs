// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::attempt::{AnswerRequest, StartAttemptRequest},
    runtime::session::AttemptSession,
    state::AppState,
    utils::html::clean_html,
};

/// Starts an attempt on a quiz for an unauthenticated student.
///
/// The quiz is snapshotted here; later edits by the teacher do not affect
/// this attempt. The countdown starts immediately.
pub async fn start_attempt(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payload = StartAttemptRequest {
        student_name: clean_html(&payload.student_name),
    };
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = state.quizzes.fetch_quiz(quiz_id).await?;
    let session = AttemptSession::start(
        quiz,
        payload.student_name,
        Arc::clone(&state.quizzes),
        Arc::clone(&state.clock),
        state.config.attempt_tick,
    )
    .await?;

    state.attempts.insert(Arc::clone(&session)).await;
    tracing::info!("Attempt {} started on quiz {}", session.id, quiz_id);

    Ok((StatusCode::CREATED, Json(session.view().await)))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.view().await))
}

pub async fn select_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, id).await?;
    let view = session.select_answer(payload.option).await?;
    Ok(Json(view))
}

/// Moves to the next question. After the last one the response carries the result.
pub async fn advance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, id).await?;
    let view = session.advance().await?;
    Ok(Json(view))
}

/// Abandons an in-progress attempt, or dismisses a finished one.
/// Nothing is recorded for an abandoned attempt.
pub async fn abandon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .attempts
        .remove(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", id)))?;

    tracing::debug!("Attempt {} closed", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<AttemptSession>, AppError> {
    state
        .attempts
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Attempt {} not found", id)))
}
