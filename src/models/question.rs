// src/models/question.rs

use serde::{Deserialize, Serialize};

/// A single multiple-choice question.
/// Stored inside the quiz row as a JSON array element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The prompt shown to the student.
    pub text: String,

    /// Ordered answer options (e.g., ["2 ATP", "4 ATP", "36 ATP", "38 ATP"]).
    pub options: Vec<String>,

    /// Index into `options` of the correct answer.
    pub correct: usize,
}

impl Question {
    pub fn is_correct(&self, answer: Option<usize>) -> bool {
        answer == Some(self.correct)
    }
}

/// DTO for sending a question to students (excludes the correct index).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub text: String,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            text: q.text.clone(),
            options: q.options.clone(),
        }
    }
}

pub fn validate_questions(questions: &[Question]) -> Result<(), validator::ValidationError> {
    if questions.is_empty() {
        return Err(validator::ValidationError::new("questions_cannot_be_empty"));
    }
    if questions.len() > crate::config::MAX_QUESTIONS {
        return Err(validator::ValidationError::new("too_many_questions"));
    }
    for q in questions {
        if q.text.trim().is_empty() || q.text.len() > 1000 {
            return Err(validator::ValidationError::new("invalid_question_text"));
        }
        if q.options.len() < 2 {
            return Err(validator::ValidationError::new("too_few_options"));
        }
        for opt in &q.options {
            if opt.trim().is_empty() || opt.len() > 500 {
                return Err(validator::ValidationError::new("invalid_option"));
            }
        }
        if q.correct >= q.options.len() {
            return Err(validator::ValidationError::new("correct_index_out_of_range"));
        }
    }
    Ok(())
}
