use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::exam::{Exam, count_correct, score_answers};
use crate::model::ids::ExamId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt already submitted")]
    AlreadySubmitted,

    #[error("question index {index} out of range ({total} questions)")]
    QuestionOutOfRange { index: usize, total: usize },

    #[error("option {option} out of range for question {index} ({count} options)")]
    OptionOutOfRange {
        index: usize,
        option: usize,
        count: usize,
    },

    #[error("{unanswered} question(s) still unanswered")]
    Unanswered { unanswered: usize },
}

/// Lifecycle of a single attempt. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptState {
    InProgress,
    Submitted {
        score: f64,
        submitted_at: DateTime<Utc>,
    },
}

/// Per-question correctness, revealed once the attempt is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerFeedback {
    Correct,
    Wrong { correct_option: usize },
}

/// Outcome handed to persistence after a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamResult {
    pub exam_id: ExamId,
    pub score: f64,
    pub passed: bool,
    pub correct: usize,
    pub total: usize,
    pub submitted_at: DateTime<Utc>,
}

/// One learner's pass through a module exam.
///
/// Answers are single-select and can be changed freely until `submit`; after
/// that the attempt is frozen and the score is fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamAttempt {
    exam: Exam,
    selected: Vec<Option<usize>>,
    state: AttemptState,
    started_at: DateTime<Utc>,
}

impl ExamAttempt {
    #[must_use]
    pub fn new(exam: Exam, started_at: DateTime<Utc>) -> Self {
        let selected = vec![None; exam.questions().len()];
        Self {
            exam,
            selected,
            state: AttemptState::InProgress,
            started_at,
        }
    }

    #[must_use]
    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn selected(&self, question: usize) -> Option<usize> {
        self.selected.get(question).copied().flatten()
    }

    #[must_use]
    pub fn selected_answers(&self) -> &[Option<usize>] {
        &self.selected
    }

    /// Select `option` for `question`, replacing any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadySubmitted` after submission, or an
    /// out-of-range error for unknown question/option indices.
    pub fn select_option(&mut self, question: usize, option: usize) -> Result<(), AttemptError> {
        if self.is_submitted() {
            return Err(AttemptError::AlreadySubmitted);
        }
        let total = self.exam.questions().len();
        let q = self
            .exam
            .questions()
            .get(question)
            .ok_or(AttemptError::QuestionOutOfRange {
                index: question,
                total,
            })?;
        if option >= q.options.len() {
            return Err(AttemptError::OptionOutOfRange {
                index: question,
                option,
                count: q.options.len(),
            });
        }
        self.selected[question] = Some(option);
        Ok(())
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.selected.iter().filter(|a| a.is_none()).count()
    }

    /// True when every question has an answer and the attempt is still open.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        !self.is_submitted() && self.unanswered_count() == 0
    }

    /// Freeze the answers and compute the score.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Unanswered` (leaving the attempt untouched) when a
    /// question has no answer, or `AttemptError::AlreadySubmitted`.
    pub fn submit(&mut self, submitted_at: DateTime<Utc>) -> Result<ExamResult, AttemptError> {
        if self.is_submitted() {
            return Err(AttemptError::AlreadySubmitted);
        }
        let unanswered = self.unanswered_count();
        if unanswered > 0 {
            return Err(AttemptError::Unanswered { unanswered });
        }

        let score = score_answers(self.exam.questions(), &self.selected);
        self.state = AttemptState::Submitted {
            score,
            submitted_at,
        };

        Ok(ExamResult {
            exam_id: self.exam.id().clone(),
            score,
            passed: score >= self.exam.min_score(),
            correct: count_correct(self.exam.questions(), &self.selected),
            total: self.exam.questions().len(),
            submitted_at,
        })
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        matches!(self.state, AttemptState::Submitted { .. })
    }

    #[must_use]
    pub fn score(&self) -> Option<f64> {
        match self.state {
            AttemptState::Submitted { score, .. } => Some(score),
            AttemptState::InProgress => None,
        }
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.score().is_some_and(|s| s >= self.exam.min_score())
    }

    /// Score rounded to one decimal for display, e.g. `"8.5"`.
    #[must_use]
    pub fn display_score(&self) -> Option<String> {
        self.score().map(|s| format!("{s:.1}"))
    }

    #[must_use]
    pub fn feedback(&self, question: usize) -> Option<AnswerFeedback> {
        if !self.is_submitted() {
            return None;
        }
        let q = self.exam.questions().get(question)?;
        let answer = self.selected(question)?;
        if q.is_correct(answer) {
            Some(AnswerFeedback::Correct)
        } else {
            Some(AnswerFeedback::Wrong {
                correct_option: q.correct_option,
            })
        }
    }
}
