// src/repository/postgres.rs

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptRecord, AttemptRow, NewAttempt},
        question::Question,
        quiz::{NewQuiz, Quiz, QuizUpdate, TeacherStats},
        user::User,
    },
    repository::{AccountRepository, QuizRepository},
};

const QUIZ_COLUMNS: &str = "id, title, questions, time_limit, teacher_id, created_at";

// Postgres SQLSTATE codes
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|c| c == code)
}

/// Raw 'quizzes' row; questions live in a JSONB column.
#[derive(FromRow)]
struct QuizRow {
    id: i64,
    title: String,
    questions: Json<Vec<Question>>,
    time_limit: i32,
    teacher_id: Option<i64>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            questions: row.questions.0,
            time_limit: row.time_limit.max(0) as u32,
            teacher_id: row.teacher_id,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct AttemptRecordRow {
    id: i64,
    quiz_id: i64,
    student_name: String,
    score: i32,
    total: i32,
    answers: Json<Vec<Option<usize>>>,
    time_taken: i64,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<AttemptRecordRow> for AttemptRecord {
    fn from(row: AttemptRecordRow) -> Self {
        Self {
            id: row.id,
            quiz_id: row.quiz_id,
            student_name: row.student_name,
            score: row.score.max(0) as u32,
            total: row.total.max(0) as u32,
            answers: row.answers.0,
            time_taken: row.time_taken.max(0) as u64,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct LeaderboardRow {
    student_name: String,
    score: i32,
    time_taken: i64,
}

#[derive(Clone)]
pub struct PgQuizRepository {
    pool: PgPool,
}

impl PgQuizRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizRepository for PgQuizRepository {
    async fn fetch_quiz(&self, id: i64) -> Result<Quiz, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE id = $1",
            QUIZ_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch quiz {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        row.map(Quiz::from)
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", id)))
    }

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, AppError> {
        let quiz_id = attempt.quiz_id;
        let row = sqlx::query_as::<_, AttemptRecordRow>(
            r#"
            INSERT INTO attempts (quiz_id, student_name, score, total, answers, time_taken)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, quiz_id, student_name, score, total, answers, time_taken, created_at
            "#,
        )
        .bind(attempt.quiz_id)
        .bind(attempt.student_name)
        .bind(attempt.score as i32)
        .bind(attempt.total as i32)
        .bind(Json(attempt.answers))
        .bind(attempt.time_taken as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if has_sqlstate(&e, FOREIGN_KEY_VIOLATION) {
                AppError::NotFound(format!("Quiz {} not found", quiz_id))
            } else {
                tracing::error!("Failed to insert attempt: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(row.into())
    }

    async fn fetch_attempts(&self, quiz_id: i64) -> Result<Vec<AttemptRow>, AppError> {
        // Insertion order, so the view model's stable sort breaks ties by arrival.
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT student_name, score, time_taken
            FROM attempts
            WHERE quiz_id = $1
            ORDER BY id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AttemptRow {
                student_name: r.student_name,
                score: r.score.max(0) as u32,
                time_taken: r.time_taken.max(0) as u64,
            })
            .collect())
    }

    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            r#"
            INSERT INTO quizzes (title, questions, time_limit, teacher_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            QUIZ_COLUMNS
        ))
        .bind(quiz.title)
        .bind(Json(quiz.questions))
        .bind(quiz.time_limit as i32)
        .bind(quiz.teacher_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create quiz: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(row.into())
    }

    async fn list_teacher_quizzes(&self, teacher_id: i64) -> Result<Vec<Quiz>, AppError> {
        let rows = sqlx::query_as::<_, QuizRow>(&format!(
            "SELECT {} FROM quizzes WHERE teacher_id = $1 ORDER BY created_at DESC, id DESC",
            QUIZ_COLUMNS
        ))
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Quiz::from).collect())
    }

    async fn teacher_stats(&self, teacher_id: i64) -> Result<TeacherStats, AppError> {
        let (total_quizzes, total_attempts) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(DISTINCT q.id) AS total_quizzes,
                COUNT(a.id) AS total_attempts
            FROM quizzes q
            LEFT JOIN attempts a ON a.quiz_id = q.id
            WHERE q.teacher_id = $1
            "#,
        )
        .bind(teacher_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TeacherStats {
            total_quizzes,
            total_attempts,
        })
    }

    async fn update_quiz(&self, id: i64, update: QuizUpdate) -> Result<Quiz, AppError> {
        let row = sqlx::query_as::<_, QuizRow>(&format!(
            r#"
            UPDATE quizzes SET
                title = COALESCE($2, title),
                questions = COALESCE($3, questions),
                time_limit = COALESCE($4, time_limit)
            WHERE id = $1
            RETURNING {}
            "#,
            QUIZ_COLUMNS
        ))
        .bind(id)
        .bind(update.title)
        .bind(update.questions.map(Json))
        .bind(update.time_limit.map(|t| t as i32))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Quiz::from)
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", id)))
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password)
            VALUES ($1, $2)
            RETURNING id, username, password, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if has_sqlstate(&e, UNIQUE_VIOLATION) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to register user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })
    }
}
