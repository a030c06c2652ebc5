// src/engine/attempt.rs

//! State machine for one student's run through a quiz.
//!
//! The engine is synchronous. The transition that leaves `Active` hands back a
//! [`Submission`]; the host persists it and then calls
//! [`AttemptEngine::mark_completed`]. The phase therefore changes before any
//! network call starts, so a late `tick` can never finish the attempt twice.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    engine::clock::Clock,
    models::{attempt::NewAttempt, quiz::Quiz},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Active,
    Submitting,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The quiz has no questions.
    InvalidQuiz,
    AlreadyAnswered,
    NotAnswered,
    InvalidOption { option: usize, available: usize },
    /// The attempt is no longer accepting input.
    NotActive,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::InvalidQuiz => write!(f, "Quiz has no questions"),
            AttemptError::AlreadyAnswered => write!(f, "Current question is already answered"),
            AttemptError::NotAnswered => write!(f, "Current question has not been answered"),
            AttemptError::InvalidOption { option, available } => write!(
                f,
                "Option {} is out of range ({} options available)",
                option, available
            ),
            AttemptError::NotActive => write!(f, "Attempt is no longer active"),
        }
    }
}

impl std::error::Error for AttemptError {}

#[derive(Debug, Clone)]
pub struct AttemptState {
    /// Snapshot taken at start; never re-fetched.
    pub quiz: Quiz,
    pub student_name: String,
    pub current_index: usize,
    pub selected_answers: Vec<Option<usize>>,
    pub time_remaining_secs: u32,
    pub phase: Phase,
    pub started_at: DateTime<Utc>,
    /// Fixed at the Active -> Submitting transition.
    pub final_score_percent: Option<u32>,
    pub time_taken: Option<u64>,
}

/// Persistence request produced exactly once per attempt.
#[derive(Debug)]
#[must_use = "a submission must be persisted and then marked completed"]
pub struct Submission(NewAttempt);

impl Submission {
    pub fn attempt(&self) -> &NewAttempt {
        &self.0
    }

    pub fn into_attempt(self) -> NewAttempt {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Performance {
    Exceptional,
    Strong,
    Average,
    NeedsWork,
}

impl Performance {
    pub fn from_score(score: u32) -> Self {
        match score {
            90.. => Performance::Exceptional,
            70..=89 => Performance::Strong,
            50..=69 => Performance::Average,
            _ => Performance::NeedsWork,
        }
    }
}

/// What the student sees once the attempt is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptResult {
    pub score: u32,
    pub correct_count: usize,
    pub total: usize,
    pub time_taken: u64,
    pub performance: Performance,
    /// Scores of 70% and above get a celebration on the results screen.
    pub celebrate: bool,
    /// Per question: did the stored answer match?
    pub breakdown: Vec<bool>,
}

pub struct AttemptEngine {
    state: AttemptState,
    clock: Arc<dyn Clock>,
}

impl AttemptEngine {
    pub fn start(
        quiz: Quiz,
        student_name: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AttemptError> {
        if quiz.questions.is_empty() {
            return Err(AttemptError::InvalidQuiz);
        }

        let state = AttemptState {
            selected_answers: vec![None; quiz.questions.len()],
            time_remaining_secs: quiz.time_limit,
            current_index: 0,
            phase: Phase::Active,
            started_at: clock.now(),
            final_score_percent: None,
            time_taken: None,
            student_name: student_name.into(),
            quiz,
        };

        Ok(Self { state, clock })
    }

    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// One elapsed second. Finishes the attempt when time runs out.
    pub fn tick(&mut self) -> Option<Submission> {
        if self.state.phase != Phase::Active {
            return None;
        }

        self.state.time_remaining_secs = self.state.time_remaining_secs.saturating_sub(1);
        if self.state.time_remaining_secs == 0 {
            tracing::debug!(
                quiz_id = self.state.quiz.id,
                student = %self.state.student_name,
                "Time limit reached, auto-submitting"
            );
            return self.finish();
        }
        None
    }

    pub fn select_answer(&mut self, option: usize) -> Result<(), AttemptError> {
        if self.state.phase != Phase::Active {
            return Err(AttemptError::NotActive);
        }

        let index = self.state.current_index;
        if self.state.selected_answers[index].is_some() {
            return Err(AttemptError::AlreadyAnswered);
        }

        let available = self.state.quiz.questions[index].options.len();
        if option >= available {
            return Err(AttemptError::InvalidOption { option, available });
        }

        self.state.selected_answers[index] = Some(option);
        Ok(())
    }

    /// Moves to the next question, or finishes after the last one.
    pub fn advance(&mut self) -> Result<Option<Submission>, AttemptError> {
        if self.state.phase != Phase::Active {
            return Err(AttemptError::NotActive);
        }
        if self.state.selected_answers[self.state.current_index].is_none() {
            return Err(AttemptError::NotAnswered);
        }

        if self.state.current_index + 1 == self.state.quiz.questions.len() {
            return Ok(self.finish());
        }

        self.state.current_index += 1;
        Ok(None)
    }

    /// Scores the attempt and enters `Submitting`. Returns `None` unless `Active`.
    pub fn finish(&mut self) -> Option<Submission> {
        if self.state.phase != Phase::Active {
            return None;
        }

        let total = self.state.quiz.questions.len();
        let score = score_percent(self.correct_count(), total);
        let time_taken = elapsed_secs(self.state.started_at, self.clock.now());

        self.state.final_score_percent = Some(score);
        self.state.time_taken = Some(time_taken);
        self.state.phase = Phase::Submitting;

        Some(Submission(NewAttempt {
            quiz_id: self.state.quiz.id,
            student_name: self.state.student_name.clone(),
            score,
            total: total as u32,
            answers: self.state.selected_answers.clone(),
            time_taken,
        }))
    }

    /// Called by the host once persistence resolved, whatever the outcome.
    pub fn mark_completed(&mut self) {
        if self.state.phase == Phase::Submitting {
            self.state.phase = Phase::Completed;
        }
    }

    pub fn correct_count(&self) -> usize {
        self.state
            .quiz
            .questions
            .iter()
            .zip(&self.state.selected_answers)
            .filter(|(q, answer)| q.is_correct(**answer))
            .count()
    }

    /// Available once the attempt is completed.
    pub fn result(&self) -> Option<AttemptResult> {
        if self.state.phase != Phase::Completed {
            return None;
        }
        let score = self.state.final_score_percent?;

        let breakdown: Vec<bool> = self
            .state
            .quiz
            .questions
            .iter()
            .zip(&self.state.selected_answers)
            .map(|(q, answer)| q.is_correct(*answer))
            .collect();

        Some(AttemptResult {
            score,
            correct_count: breakdown.iter().filter(|ok| **ok).count(),
            total: breakdown.len(),
            time_taken: self.state.time_taken.unwrap_or(0),
            performance: Performance::from_score(score),
            celebrate: score >= 70,
            breakdown,
        })
    }
}

/// `round(100 * correct / total)` with halves rounded up, in integer arithmetic.
pub fn score_percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * correct + total) / (2 * total)) as u32
}

/// Whole seconds between two instants, rounded to nearest and never negative.
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let millis = (to - from).num_milliseconds().max(0) as u64;
    (millis + 500) / 1000
}
