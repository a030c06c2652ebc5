// src/models/quiz.rs

use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    config::UNTITLED_QUIZ,
    models::question::{PublicQuestion, Question, validate_questions},
    utils::html::clean_html,
};

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub questions: Vec<Question>,

    /// Time allowed for one attempt, in seconds.
    pub time_limit: u32,

    /// Owning teacher. `None` for quizzes created anonymously.
    pub teacher_id: Option<i64>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO shown on the quiz start page and during an attempt (answers hidden).
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicQuiz {
    pub id: i64,
    pub title: String,
    pub time_limit: u32,
    pub question_count: usize,
    pub questions: Vec<PublicQuestion>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            time_limit: quiz.time_limit,
            question_count: quiz.questions.len(),
            questions: quiz.questions.iter().map(PublicQuestion::from).collect(),
        }
    }
}

/// Repository input for inserting a quiz.
#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub questions: Vec<Question>,
    pub time_limit: u32,
    pub teacher_id: Option<i64>,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct QuizUpdate {
    pub title: Option<String>,
    pub questions: Option<Vec<Question>>,
    pub time_limit: Option<u32>,
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 chars"))]
    pub title: Option<String>,

    /// Name of the uploaded lecture file; its stem becomes the title when none is given.
    #[validate(length(max = 255))]
    pub source_filename: Option<String>,

    #[validate(custom(function = validate_questions))]
    pub questions: Vec<Question>,

    #[validate(range(min = 10, max = 86_400, message = "Time limit must be between 10s and 24h"))]
    pub time_limit: Option<u32>,
}

/// DTO for updating a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(custom(function = validate_questions))]
    pub questions: Option<Vec<Question>>,

    #[validate(range(min = 10, max = 86_400))]
    pub time_limit: Option<u32>,
}

/// Dashboard counters for one teacher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherStats {
    pub total_quizzes: i64,
    pub total_attempts: i64,
}

/// Picks the quiz title: explicit title, else the upload's file stem, else a placeholder.
pub fn resolve_title(title: Option<&str>, source_filename: Option<&str>) -> String {
    let explicit = title
        .map(|t| clean_html(t.trim()))
        .filter(|t| !t.is_empty());
    if let Some(t) = explicit {
        return t;
    }

    source_filename
        .and_then(|name| Path::new(name.trim()).file_stem())
        .and_then(|stem| stem.to_str())
        .map(clean_html)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_QUIZ.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_title_wins() {
        assert_eq!(resolve_title(Some("  Cell Biology "), Some("notes.pdf")), "Cell Biology");
    }

    #[test]
    fn falls_back_to_file_stem() {
        assert_eq!(resolve_title(None, Some("lecture.notes.pdf")), "lecture.notes");
        assert_eq!(resolve_title(Some("   "), Some("week3.pptx")), "week3");
    }

    #[test]
    fn falls_back_to_placeholder() {
        assert_eq!(resolve_title(None, None), UNTITLED_QUIZ);
    }

    #[test]
    fn strips_markup_from_titles() {
        assert_eq!(resolve_title(Some("<script>x</script>Quiz"), None), "Quiz");
    }

    #[test]
    fn public_quiz_hides_answers() {
        let quiz = Quiz {
            id: 7,
            title: "Glycolysis".into(),
            questions: vec![Question {
                text: "ATP yield?".into(),
                options: vec!["2".into(), "4".into()],
                correct: 0,
            }],
            time_limit: 600,
            teacher_id: None,
            created_at: None,
        };
        let json = serde_json::to_value(PublicQuiz::from(&quiz)).unwrap();
        assert_eq!(json["question_count"], 1);
        assert!(json["questions"][0].get("correct").is_none());
    }
}
