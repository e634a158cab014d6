use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExamId, QuestionId};

/// Highest score an exam can award.
pub const MAX_SCORE: f64 = 10.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam title cannot be empty")]
    EmptyTitle,

    #[error("exam must contain at least one question")]
    NoQuestions,

    #[error("question {index} has empty text")]
    EmptyQuestionText { index: usize },

    #[error("question {index} needs at least two options, got {count}")]
    TooFewOptions { index: usize, count: usize },

    #[error("question {index} marks option {correct} as correct but has {count} options")]
    CorrectOptionOutOfRange {
        index: usize,
        correct: usize,
        count: usize,
    },

    #[error("minimum score must be within 0..=10, got {0}")]
    InvalidMinScore(f64),

    #[error("max attempts must be > 0")]
    InvalidMaxAttempts,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub correct_option: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    #[must_use]
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option
    }
}

//
// ─── EXAM ──────────────────────────────────────────────────────────────────────
//

/// Unvalidated exam as it appears in catalog fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamDraft {
    pub id: ExamId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub min_score: f64,
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// Terminal quiz of a module.
///
/// Always holds at least one question, and every question has at least two
/// options with an in-range correct option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExamDraft", into = "ExamDraft")]
pub struct Exam {
    id: ExamId,
    title: String,
    description: String,
    min_score: f64,
    questions: Vec<Question>,
    time_limit_minutes: Option<u32>,
    max_attempts: Option<u32>,
}

impl ExamDraft {
    /// Validate the draft into an `Exam`.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` when the title is blank, the question list is empty,
    /// a question is malformed, or the limits are out of range.
    pub fn validate(self) -> Result<Exam, ExamError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(ExamError::EmptyTitle);
        }
        if !self.min_score.is_finite() || !(0.0..=MAX_SCORE).contains(&self.min_score) {
            return Err(ExamError::InvalidMinScore(self.min_score));
        }
        if self.max_attempts == Some(0) {
            return Err(ExamError::InvalidMaxAttempts);
        }
        if self.questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        for (index, q) in self.questions.iter().enumerate() {
            if q.text.trim().is_empty() {
                return Err(ExamError::EmptyQuestionText { index });
            }
            let count = q.options.len();
            if count < 2 {
                return Err(ExamError::TooFewOptions { index, count });
            }
            if q.correct_option >= count {
                return Err(ExamError::CorrectOptionOutOfRange {
                    index,
                    correct: q.correct_option,
                    count,
                });
            }
        }

        Ok(Exam {
            id: self.id,
            title,
            description: self.description.trim().to_owned(),
            min_score: self.min_score,
            questions: self.questions,
            time_limit_minutes: self.time_limit_minutes,
            max_attempts: self.max_attempts,
        })
    }
}

impl TryFrom<ExamDraft> for Exam {
    type Error = ExamError;

    fn try_from(draft: ExamDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Exam> for ExamDraft {
    fn from(exam: Exam) -> Self {
        Self {
            id: exam.id,
            title: exam.title,
            description: exam.description,
            min_score: exam.min_score,
            questions: exam.questions,
            time_limit_minutes: exam.time_limit_minutes,
            max_attempts: exam.max_attempts,
        }
    }
}

impl Exam {
    #[must_use]
    pub fn id(&self) -> &ExamId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Score needed to pass, on the 0–10 scale.
    #[must_use]
    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Modelled only; attempts are not timed.
    #[must_use]
    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

/// Scores a set of answers on the 0–10 scale.
///
/// Unanswered and out-of-range answers count as wrong. Returns `0.0` for an
/// empty question list.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_answers(questions: &[Question], selected: &[Option<usize>]) -> f64 {
    if questions.is_empty() {
        return 0.0;
    }
    let correct = count_correct(questions, selected);
    MAX_SCORE * correct as f64 / questions.len() as f64
}

pub(crate) fn count_correct(questions: &[Question], selected: &[Option<usize>]) -> usize {
    questions
        .iter()
        .zip(selected.iter())
        .filter(|(q, answer)| answer.is_some_and(|a| q.is_correct(a)))
        .count()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
