use crate::models::question::Question;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GradeQuestionRequest {
    pub question: Question,
    #[serde(default)]
    pub answer: JsonValue,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GradeAssessmentRequest {
    #[validate(length(min = 1, message = "At least one question is required"))]
    pub questions: Vec<Question>,
    /// Keyed by question id.
    #[serde(default)]
    pub answers: HashMap<String, JsonValue>,
    #[validate(range(min = 0.0, max = 100.0, message = "Passing score is a percentage"))]
    pub passing_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeBatchResponse<T: Serialize> {
    pub count: usize,
    pub questions: Vec<T>,
}
