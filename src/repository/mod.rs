// src/repository/mod.rs

//! Storage seams. The engine only needs `fetch_quiz`, `insert_attempt` and
//! `fetch_attempts`; the rest backs the teacher-facing endpoints.

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptRecord, AttemptRow, NewAttempt},
        quiz::{NewQuiz, Quiz, QuizUpdate, TeacherStats},
        user::User,
    },
};

pub mod memory;
pub mod postgres;
#[cfg(test)]
pub(crate) mod testing;

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// `AppError::NotFound` when no quiz has this id.
    async fn fetch_quiz(&self, id: i64) -> Result<Quiz, AppError>;

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, AppError>;

    /// All attempts for one quiz, in no particular order.
    async fn fetch_attempts(&self, quiz_id: i64) -> Result<Vec<AttemptRow>, AppError>;

    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError>;

    /// Newest first.
    async fn list_teacher_quizzes(&self, teacher_id: i64) -> Result<Vec<Quiz>, AppError>;

    async fn teacher_stats(&self, teacher_id: i64) -> Result<TeacherStats, AppError>;

    async fn update_quiz(&self, id: i64, update: QuizUpdate) -> Result<Quiz, AppError>;

    /// Returns `false` if the quiz did not exist.
    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// `AppError::Conflict` when the username is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
}
