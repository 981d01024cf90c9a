use crate::models::question::QuestionType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of grading one submitted answer against one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub is_valid: bool,
    /// `None` when correctness can only be decided by a reviewer.
    pub is_correct: Option<bool>,
    pub score: f64,
    pub max_score: f64,
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_credit: Option<PartialCredit>,
    #[serde(default)]
    pub requires_manual_review: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl AnswerResult {
    pub fn invalid(
        question_type: QuestionType,
        max_score: f64,
        feedback: impl Into<String>,
        errors: Vec<String>,
    ) -> Self {
        Self {
            question_type,
            is_valid: false,
            is_correct: Some(false),
            score: 0.0,
            max_score,
            feedback: feedback.into(),
            partial_credit: None,
            requires_manual_review: false,
            errors,
        }
    }

    pub fn graded(
        question_type: QuestionType,
        is_correct: bool,
        score: f64,
        max_score: f64,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            question_type,
            is_valid: true,
            is_correct: Some(is_correct),
            score: clamp_score(score, max_score),
            max_score,
            feedback: feedback.into(),
            partial_credit: None,
            requires_manual_review: false,
            errors: Vec::new(),
        }
    }

    /// Accepted for a human to grade; `is_correct` stays unknown.
    pub fn pending_review(
        question_type: QuestionType,
        score: f64,
        max_score: f64,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            question_type,
            is_valid: true,
            is_correct: None,
            score: clamp_score(score, max_score),
            max_score,
            feedback: feedback.into(),
            partial_credit: None,
            requires_manual_review: true,
            errors: Vec::new(),
        }
    }

    pub fn with_partial_credit(mut self, partial: PartialCredit) -> Self {
        self.partial_credit = Some(partial);
        self
    }
}

pub fn clamp_score(score: f64, max_score: f64) -> f64 {
    if !score.is_finite() || score <= 0.0 {
        0.0
    } else if score > max_score {
        max_score
    } else {
        score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialCredit {
    /// Sub-items answered correctly.
    pub earned: usize,
    /// Sub-items in total.
    pub possible: usize,
    pub per_item_details: Vec<ItemOutcome>,
}

impl PartialCredit {
    pub fn from_items(items: Vec<ItemOutcome>) -> Self {
        Self {
            earned: items.iter().filter(|i| i.correct).count(),
            possible: items.len(),
            per_item_details: items,
        }
    }

    pub fn ratio(&self) -> f64 {
        if self.possible == 0 {
            0.0
        } else {
            self.earned as f64 / self.possible as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub id: String,
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
}

/// Aggregate over a set of graded questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub total_score: f64,
    pub max_score: f64,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    pub requires_manual_review: bool,
    pub results: BTreeMap<String, AnswerResult>,
}
