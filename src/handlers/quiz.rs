// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use url::Url;
use validator::Validate;

use crate::{
    config::DEFAULT_TIME_LIMIT_SECS,
    error::AppError,
    models::quiz::{
        CreateQuizRequest, NewQuiz, PublicQuiz, Quiz, QuizUpdate, UpdateQuizRequest, resolve_title,
    },
    state::AppState,
    utils::{html::clean_html, jwt::Claims},
};

/// Creates a quiz owned by the calling teacher.
///
/// * Title falls back to the uploaded file's stem, then to "Untitled Quiz".
/// * Time limit defaults to 10 minutes.
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let teacher_id = claims.user_id()?;
    let title = resolve_title(payload.title.as_deref(), payload.source_filename.as_deref());

    let quiz = state
        .quizzes
        .create_quiz(NewQuiz {
            title,
            questions: payload.questions,
            time_limit: payload.time_limit.unwrap_or(DEFAULT_TIME_LIMIT_SECS),
            teacher_id: Some(teacher_id),
        })
        .await?;

    let share_url = share_url(&state.config.public_base_url, quiz.id)?;
    tracing::info!("Teacher {} created quiz {} ({:?})", teacher_id, quiz.id, quiz.title);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "quiz": quiz,
            "share_url": share_url
        })),
    ))
}

/// Lists the calling teacher's quizzes, newest first.
pub async fn list_quizzes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = state.quizzes.list_teacher_quizzes(claims.user_id()?).await?;
    Ok(Json(quizzes))
}

/// Dashboard counters: quizzes created and attempts received.
pub async fn teacher_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let stats = state.quizzes.teacher_stats(claims.user_id()?).await?;
    Ok(Json(stats))
}

/// Public view of a quiz for the start page. Correct answers are never sent.
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = state.quizzes.fetch_quiz(id).await?;
    Ok(Json(PublicQuiz::from(&quiz)))
}

/// Returns the student-facing link for a quiz.
pub async fn share_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // 404 for unknown quizzes rather than a dead link.
    state.quizzes.fetch_quiz(id).await?;
    let url = share_url(&state.config.public_base_url, id)?;
    Ok(Json(json!({ "quiz_id": id, "share_url": url })))
}

/// Updates a quiz. Attempts already in progress keep their own snapshot.
pub async fn update_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    ensure_owner(&state, &claims, id).await?;

    let title = match payload.title.as_deref().map(clean_html) {
        Some(t) if t.is_empty() => {
            return Err(AppError::BadRequest("Title cannot be empty".to_string()));
        }
        other => other,
    };

    let quiz = state
        .quizzes
        .update_quiz(
            id,
            QuizUpdate {
                title,
                questions: payload.questions,
                time_limit: payload.time_limit,
            },
        )
        .await?;

    Ok(Json(quiz))
}

/// Deletes a quiz together with its attempts and stops its leaderboard poller.
pub async fn delete_quiz(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    ensure_owner(&state, &claims, id).await?;

    if !state.quizzes.delete_quiz(id).await? {
        return Err(AppError::NotFound(format!("Quiz {} not found", id)));
    }
    state.leaderboards.stop(id).await;

    tracing::info!("Quiz {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_owner(state: &AppState, claims: &Claims, quiz_id: i64) -> Result<Quiz, AppError> {
    let quiz = state.quizzes.fetch_quiz(quiz_id).await?;
    if quiz.teacher_id != Some(claims.user_id()?) {
        return Err(AppError::Forbidden("You do not own this quiz".to_string()));
    }
    Ok(quiz)
}

/// `{base}/quiz/{id}/start`, tolerant of a trailing slash or path prefix on `base`.
pub fn share_url(base: &str, quiz_id: i64) -> Result<String, AppError> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    let url = Url::parse(&base)
        .and_then(|b| b.join(&format!("quiz/{}/start", quiz_id)))
        .map_err(|e| AppError::InternalServerError(format!("Invalid PUBLIC_BASE_URL: {}", e)))?;

    Ok(url.to_string())
}
