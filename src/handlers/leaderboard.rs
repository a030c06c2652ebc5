// src/handlers/leaderboard.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{error::AppError, state::AppState};

/// Live leaderboard for one quiz.
///
/// Each call counts as an observation and keeps the quiz's poller alive;
/// the snapshot may be up to one refresh interval old.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state.quizzes.fetch_quiz(quiz_id).await?;
    let board = state.leaderboards.observe(quiz_id).await;

    Ok(Json(json!({
        "quiz_id": quiz.id,
        "title": quiz.title,
        "entries": board.entries,
        "stats": board.stats,
        "refreshed_at": board.refreshed_at,
        "refresh_interval_secs": state.config.leaderboard_refresh.as_secs()
    })))
}
