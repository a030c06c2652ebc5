// src/repository/memory.rs

//! In-process storage, used when no database is configured and in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        attempt::{AttemptRecord, AttemptRow, NewAttempt},
        quiz::{NewQuiz, Quiz, QuizUpdate, TeacherStats},
        user::User,
    },
    repository::{AccountRepository, QuizRepository},
};

#[derive(Default)]
struct QuizStore {
    quizzes: BTreeMap<i64, Quiz>,
    attempts: Vec<AttemptRecord>,
    last_quiz_id: i64,
    last_attempt_id: i64,
}

#[derive(Default)]
pub struct MemoryQuizRepository {
    store: RwLock<QuizStore>,
}

impl MemoryQuizRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizRepository for MemoryQuizRepository {
    async fn fetch_quiz(&self, id: i64) -> Result<Quiz, AppError> {
        self.store
            .read()
            .await
            .quizzes
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", id)))
    }

    async fn insert_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, AppError> {
        let mut store = self.store.write().await;
        if !store.quizzes.contains_key(&attempt.quiz_id) {
            return Err(AppError::NotFound(format!("Quiz {} not found", attempt.quiz_id)));
        }

        store.last_attempt_id += 1;
        let record = AttemptRecord {
            id: store.last_attempt_id,
            quiz_id: attempt.quiz_id,
            student_name: attempt.student_name,
            score: attempt.score,
            total: attempt.total,
            answers: attempt.answers,
            time_taken: attempt.time_taken,
            created_at: Some(chrono::Utc::now()),
        };
        store.attempts.push(record.clone());
        Ok(record)
    }

    async fn fetch_attempts(&self, quiz_id: i64) -> Result<Vec<AttemptRow>, AppError> {
        Ok(self
            .store
            .read()
            .await
            .attempts
            .iter()
            .filter(|a| a.quiz_id == quiz_id)
            .map(AttemptRow::from)
            .collect())
    }

    async fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz, AppError> {
        let mut store = self.store.write().await;
        store.last_quiz_id += 1;
        let quiz = Quiz {
            id: store.last_quiz_id,
            title: quiz.title,
            questions: quiz.questions,
            time_limit: quiz.time_limit,
            teacher_id: quiz.teacher_id,
            created_at: Some(chrono::Utc::now()),
        };
        store.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn list_teacher_quizzes(&self, teacher_id: i64) -> Result<Vec<Quiz>, AppError> {
        // Ids grow with insertion, so reverse id order is newest first.
        Ok(self
            .store
            .read()
            .await
            .quizzes
            .values()
            .rev()
            .filter(|q| q.teacher_id == Some(teacher_id))
            .cloned()
            .collect())
    }

    async fn teacher_stats(&self, teacher_id: i64) -> Result<TeacherStats, AppError> {
        let store = self.store.read().await;
        let quiz_ids: Vec<i64> = store
            .quizzes
            .values()
            .filter(|q| q.teacher_id == Some(teacher_id))
            .map(|q| q.id)
            .collect();

        let total_attempts = store
            .attempts
            .iter()
            .filter(|a| quiz_ids.contains(&a.quiz_id))
            .count();

        Ok(TeacherStats {
            total_quizzes: quiz_ids.len() as i64,
            total_attempts: total_attempts as i64,
        })
    }

    async fn update_quiz(&self, id: i64, update: QuizUpdate) -> Result<Quiz, AppError> {
        let mut store = self.store.write().await;
        let quiz = store
            .quizzes
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Quiz {} not found", id)))?;

        if let Some(title) = update.title {
            quiz.title = title;
        }
        if let Some(questions) = update.questions {
            quiz.questions = questions;
        }
        if let Some(time_limit) = update.time_limit {
            quiz.time_limit = time_limit;
        }
        Ok(quiz.clone())
    }

    async fn delete_quiz(&self, id: i64) -> Result<bool, AppError> {
        let mut store = self.store.write().await;
        let existed = store.quizzes.remove(&id).is_some();
        // Mirrors ON DELETE CASCADE on the attempts table.
        store.attempts.retain(|a| a.quiz_id != id);
        Ok(existed)
    }
}

#[derive(Default)]
struct AccountStore {
    users: Vec<User>,
}

#[derive(Default)]
pub struct MemoryAccountRepository {
    store: RwLock<AccountStore>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut store = self.store.write().await;
        if store.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!("Username '{}' already exists", username)));
        }

        let user = User {
            id: store.users.len() as i64 + 1,
            username: username.to_string(),
            password: password_hash.to_string(),
            created_at: Some(chrono::Utc::now()),
        };
        store.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .store
            .read()
            .await
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Question;

    fn new_quiz(teacher_id: Option<i64>) -> NewQuiz {
        NewQuiz {
            title: "Thermodynamics".into(),
            questions: vec![Question {
                text: "First law?".into(),
                options: vec!["Energy is conserved".into(), "Entropy decreases".into()],
                correct: 0,
            }],
            time_limit: 300,
            teacher_id,
        }
    }

    #[tokio::test]
    async fn teacher_listing_is_newest_first() {
        let repo = MemoryQuizRepository::new();
        let first = repo.create_quiz(new_quiz(Some(1))).await.unwrap();
        repo.create_quiz(new_quiz(Some(2))).await.unwrap();
        let third = repo.create_quiz(new_quiz(Some(1))).await.unwrap();

        let ids: Vec<i64> = repo
            .list_teacher_quizzes(1)
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec![third.id, first.id]);
    }

    #[tokio::test]
    async fn stats_count_attempts_across_own_quizzes() {
        let repo = MemoryQuizRepository::new();
        let mine = repo.create_quiz(new_quiz(Some(1))).await.unwrap();
        let other = repo.create_quiz(new_quiz(Some(2))).await.unwrap();
        for quiz_id in [mine.id, mine.id, other.id] {
            repo.insert_attempt(NewAttempt {
                quiz_id,
                student_name: "Riya".into(),
                score: 100,
                total: 1,
                answers: vec![Some(0)],
                time_taken: 12,
            })
            .await
            .unwrap();
        }

        let stats = repo.teacher_stats(1).await.unwrap();
        assert_eq!(stats, TeacherStats { total_quizzes: 1, total_attempts: 2 });
        assert_eq!(repo.teacher_stats(99).await.unwrap(), TeacherStats::default());
    }

    #[tokio::test]
    async fn attempt_for_unknown_quiz_is_rejected() {
        let repo = MemoryQuizRepository::new();
        let err = repo
            .insert_attempt(NewAttempt {
                quiz_id: 404,
                student_name: "Ghost".into(),
                score: 0,
                total: 1,
                answers: vec![None],
                time_taken: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_quiz_and_attempts() {
        let repo = MemoryQuizRepository::new();
        let quiz = repo.create_quiz(new_quiz(None)).await.unwrap();
        assert!(repo.delete_quiz(quiz.id).await.unwrap());
        assert!(!repo.delete_quiz(quiz.id).await.unwrap());
        assert!(matches!(repo.fetch_quiz(quiz.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let repo = MemoryAccountRepository::new();
        repo.create_user("teacher", "hash").await.unwrap();
        let err = repo.create_user("teacher", "hash").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
