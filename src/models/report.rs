use crate::models::question::Question;
use serde::{Deserialize, Serialize};

/// Non-fatal problems found while turning raw content into questions or grading answers.
/// These are carried in result objects; nothing in the pipeline raises them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentIssue {
    #[error("missing required field `{field}`, used {fallback}")]
    MissingRequiredField { field: String, fallback: String },

    #[error("ambiguous type: {detail}")]
    AmbiguousType { detail: String },

    #[error("malformed answer: {detail}")]
    MalformedAnswer { detail: String },

    #[error("manual review required")]
    ManualReviewRequired,
}

impl ContentIssue {
    pub fn missing(field: impl Into<String>, fallback: impl Into<String>) -> Self {
        ContentIssue::MissingRequiredField {
            field: field.into(),
            fallback: fallback.into(),
        }
    }

    pub fn ambiguous(detail: impl Into<String>) -> Self {
        ContentIssue::AmbiguousType {
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        ContentIssue::MalformedAnswer {
            detail: detail.into(),
        }
    }
}

/// A normalized question together with everything that had to be patched up to build it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalized {
    pub question: Question,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ContentIssue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub(crate) fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub(crate) fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub(crate) fn finish(mut self) -> Self {
        self.is_valid = self.errors.is_empty();
        self
    }
}
