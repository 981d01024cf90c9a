use crate::dto::question_dto::GradeAssessmentRequest;
use crate::error::Result;
use crate::utils::validation::{ensure_max_len, validate};
use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::Value as JsonValue;

#[axum::debug_handler]
pub async fn grade_assessment(
    State(state): State<AppState>,
    Json(payload): Json<JsonValue>,
) -> Result<impl IntoResponse> {
    let request: GradeAssessmentRequest = serde_json::from_value(payload)?;
    validate(&request)?;
    ensure_max_len("questions", request.questions.len(), state.max_batch_questions)?;

    let result = state.grading_service.grade_assessment(
        &request.questions,
        &request.answers,
        request.passing_score,
    );
    Ok(Json(result))
}
