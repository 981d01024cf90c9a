use crate::dto::question_dto::{GradeQuestionRequest, NormalizeBatchResponse};
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::Value as JsonValue;

#[axum::debug_handler]
pub async fn detect(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let detection = state.normalization_service.detector().detect(&payload);
    Ok(Json(detection))
}

#[axum::debug_handler]
pub async fn normalize(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let normalized = state.normalization_service.normalize(&payload);
    Ok(Json(normalized))
}

#[axum::debug_handler]
pub async fn normalize_batch(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    if payload.get("questions").and_then(|q| q.as_array()).is_none() && !payload.is_array() {
        return Err(Error::BadRequest(
            "Expected a `questions` array or a bare array".to_string(),
        ));
    }
    let questions = state.normalization_service.normalize_batch(&payload);
    Ok(Json(NormalizeBatchResponse {
        count: questions.len(),
        questions,
    }))
}

/// Takes the body as plain JSON so a shape mismatch is a 400 with serde's message.
#[axum::debug_handler]
pub async fn validate_question(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let question: Question = serde_json::from_value(payload)?;
    Ok(Json(state.validation_service.validate(&question)))
}

#[axum::debug_handler]
pub async fn grade_question(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let request: GradeQuestionRequest = serde_json::from_value(payload)?;
    let result = state
        .grading_service
        .grade(&request.question, &request.answer);
    Ok(Json(result))
}
