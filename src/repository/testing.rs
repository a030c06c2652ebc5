// src/repository/testing.rs

use std::{
    sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptRecord, AttemptRow, NewAttempt},
        quiz::{NewQuiz, Quiz, QuizUpdate, TeacherStats},
    },
    repository::{QuizRepository, memory::MemoryQuizRepository},
};

/// Memory repository whose attempt reads and writes can be switched off.
#[derive(Default)]
pub struct FlakyQuizRepository {
    pub inner: MemoryQuizRepository,
    pub fail_inserts: AtomicBool,
    pub fail_fetches: AtomicBool,
    pub fetch_calls: AtomicUsize,
    /// Artificial latency on `fetch_attempts`, in milliseconds.
    pub fetch_delay_ms: AtomicU64,
}

impl FlakyQuizRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        self.fetch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuizRepository for FlakyQuizRepository {
    async fn fetch_quiz(&self, id: i64) -> Result<Quiz, AppError> {
        self.inner.fetch_quiz(id).await
    }

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, AppError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError("store offline".into()));
        }
        self.inner.insert_attempt(attempt).await
    }

    async fn fetch_attempts(&self, quiz_id: i64) -> Result<Vec<AttemptRow>, AppError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError("store offline".into()));
        }
        self.inner.fetch_attempts(quiz_id).await
    }

    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        self.inner.create_quiz(quiz).await
    }

    async fn list_teacher_quizzes(&self, teacher_id: i64) -> Result<Vec<Quiz>, AppError> {
        self.inner.list_teacher_quizzes(teacher_id).await
    }

    async fn teacher_stats(&self, teacher_id: i64) -> Result<TeacherStats, AppError> {
        self.inner.teacher_stats(teacher_id).await
    }

    async fn update_quiz(&self, id: i64, update: QuizUpdate) -> Result<Quiz, AppError> {
        self.inner.update_quiz(id, update).await
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        self.inner.delete_quiz(id).await
    }
}
