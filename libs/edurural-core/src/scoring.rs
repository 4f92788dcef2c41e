//! Quiz grading.
//!
//! Scores are whole percentages rounded half-up, so 1 of 8 correct is 13.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::types::{Quiz, UNANSWERED};

/// Minimum score that earns a badge.
pub const BADGE_THRESHOLD: u8 = 80;

/// Minimum score for the "good" feedback tier.
pub const GOOD_THRESHOLD: u8 = 60;

/// Graded submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub correct: usize,
    pub total: usize,
    pub score: u8,
}

/// Feedback tier shown after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    Excellent,
    Good,
    KeepPracticing,
}

impl Feedback {
    pub fn from_score(score: u8) -> Self {
        if score >= BADGE_THRESHOLD {
            Self::Excellent
        } else if score >= GOOD_THRESHOLD {
            Self::Good
        } else {
            Self::KeepPracticing
        }
    }
}

/// Whether a score earns a badge.
pub fn earns_badge(score: u8) -> bool {
    score >= BADGE_THRESHOLD
}

/// Percentage of correct answers, rounded half-up. Zero questions score zero.
pub fn score_percentage(correct: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = correct.min(total);
    ((correct * 200 + total) / (2 * total)) as u8
}

/// Grade `answers` against `quiz`.
///
/// `answers` must be parallel to the quiz's questions. Each entry is an
/// option index or `UNANSWERED`.
pub fn grade(quiz: &Quiz, answers: &[i32]) -> Result<Grade> {
    if quiz.questions.is_empty() {
        return Err(ValidationError::EmptyQuiz);
    }
    if answers.len() != quiz.questions.len() {
        return Err(ValidationError::AnswerCount {
            expected: quiz.questions.len(),
            actual: answers.len(),
        });
    }

    let mut correct = 0;
    for (question_idx, (question, &answer)) in quiz.questions.iter().zip(answers).enumerate() {
        if answer == UNANSWERED {
            continue;
        }
        let selected = usize::try_from(answer)
            .ok()
            .filter(|idx| *idx < question.options.len())
            .ok_or(ValidationError::AnswerOutOfRange {
                question: question_idx,
                value: answer,
            })?;
        if selected == question.correct_index {
            correct += 1;
        }
    }

    let total = quiz.questions.len();
    Ok(Grade {
        correct,
        total,
        score: score_percentage(correct, total),
    })
}
