// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Attempt payload handed to the repository when a session finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAttempt {
    pub quiz_id: i64,
    pub student_name: String,
    /// Percentage, 0..=100.
    pub score: u32,
    /// Number of questions in the quiz snapshot.
    pub total: u32,
    /// One slot per question; `None` means unanswered.
    pub answers: Vec<Option<usize>>,
    /// Wall-clock seconds between start and finish.
    pub time_taken: u64,
}

/// Represents the 'attempts' table in the database.
/// Attempts are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: i64,
    pub quiz_id: i64,
    pub student_name: String,
    pub score: u32,
    pub total: u32,
    pub answers: Vec<Option<usize>>,
    pub time_taken: u64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// The slice of an attempt the leaderboard needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRow {
    pub student_name: String,
    pub score: u32,
    pub time_taken: u64,
}

impl From<&AttemptRecord> for AttemptRow {
    fn from(record: &AttemptRecord) -> Self {
        Self {
            student_name: record.student_name.clone(),
            score: record.score,
            time_taken: record.time_taken,
        }
    }
}

/// DTO for starting an attempt. Students are identified only by this name.
#[derive(Debug, Deserialize, Validate)]
pub struct StartAttemptRequest {
    #[validate(length(
        min = 1,
        max = 50,
        message = "Name length must be between 1 and 50 characters."
    ))]
    pub student_name: String,
}

/// DTO for selecting an answer on the current question.
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub option: usize,
}
