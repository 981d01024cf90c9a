use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use question_engine::{config, middleware::rate_limit, routes, AppState};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

fn app() -> Router {
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("PUBLIC_RPS", "1000");
    env::set_var("MAX_BATCH_QUESTIONS", "3");
    // Several tests race to initialize; whichever wins, the values above apply.
    let _ = config::init_config();
    let config = config::get_config();

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/questions/detect", post(routes::questions::detect))
        .route("/api/questions/normalize", post(routes::questions::normalize))
        .route(
            "/api/questions/normalize/batch",
            post(routes::questions::normalize_batch),
        )
        .route(
            "/api/questions/validate",
            post(routes::questions::validate_question),
        )
        .route("/api/questions/grade", post(routes::questions::grade_question))
        .route(
            "/api/assessments/grade",
            post(routes::assessments::grade_assessment),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.public_rps),
            rate_limit::rps_middleware,
        ))
        .with_state(AppState::new(config))
}

async fn post_json(app: &Router, uri: &str, body: JsonValue) -> (StatusCode, JsonValue) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, json)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "question-engine");
}

#[tokio::test]
async fn detect_names_type_and_rule() {
    let app = app();
    let (status, body) = post_json(
        &app,
        "/api/questions/detect",
        json!({"question": "How many stars? 🌟🌟🌟", "visual": "🌟🌟🌟"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["questionType"], "counting");
    assert_eq!(body["rule"], "counting_with_glyphs");

    let (_, body) = post_json(
        &app,
        "/api/questions/detect",
        json!({"type": "essay", "question": "Describe your weekend."}),
    )
    .await;
    assert_eq!(body["questionType"], "essay");
    assert_eq!(body["rule"], "explicit_tag");
}

#[tokio::test]
async fn normalize_then_grade_round_trip() {
    let app = app();
    let (status, body) = post_json(
        &app,
        "/api/questions/normalize",
        json!({
            "type": "multiple_choice",
            "question": "Which letter comes second?",
            "options": ["A", "B", "C", "D"],
            "correct_answer": 1,
            "points": 4
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let question = body["question"].clone();
    assert_eq!(question["type"], "multiple_choice");
    assert_eq!(question["options"][1]["isCorrect"], true);
    assert_eq!(question["options"][0]["isCorrect"], false);
    assert!(question["id"].as_str().is_some_and(|id| !id.is_empty()));

    let (status, report) =
        post_json(&app, "/api/questions/validate", question.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["isValid"], true);

    let (status, result) = post_json(
        &app,
        "/api/questions/grade",
        json!({"question": question, "answer": "B"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["isCorrect"], true);
    assert_eq!(result["score"], 4.0);
    assert_eq!(result["maxScore"], 4.0);
}

#[tokio::test]
async fn grading_without_answer_is_invalid_not_an_error() {
    let app = app();
    let question = json!({
        "id": "q1",
        "type": "true_false",
        "content": "The sky is green.",
        "statement": "The sky is green.",
        "correctAnswer": false
    });
    let (status, result) =
        post_json(&app, "/api/questions/grade", json!({"question": question})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["isValid"], false);
    assert_eq!(result["score"], 0.0);
}

#[tokio::test]
async fn batch_normalization_is_capped() {
    let app = app();
    let questions: Vec<JsonValue> = (0..5)
        .map(|i| json!({"type": "short_answer", "question": format!("Q{}", i), "correct_answer": "x"}))
        .collect();
    let (status, body) = post_json(
        &app,
        "/api/questions/normalize/batch",
        json!({ "questions": questions }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["questions"].as_array().map(Vec::len), Some(3));

    let (status, _) = post_json(
        &app,
        "/api/questions/normalize/batch",
        json!({"question": "not a batch"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_question_shape_is_bad_request() {
    let app = app();
    let (status, body) = post_json(
        &app,
        "/api/questions/validate",
        json!({"id": "q1", "content": "?", "type": "riddle"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = post_json(
        &app,
        "/api/questions/grade",
        json!({"question": {"type": "numeric"}, "answer": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assessment_grading_and_request_validation() {
    let app = app();
    let questions = json!([
        {
            "id": "q1",
            "type": "numeric",
            "content": "6 x 7?",
            "points": 5,
            "correctAnswer": 42,
            "tolerance": 0
        },
        {
            "id": "q2",
            "type": "true_false",
            "content": "Water is wet.",
            "statement": "Water is wet.",
            "points": 5,
            "correctAnswer": true
        }
    ]);

    let (status, body) = post_json(
        &app,
        "/api/assessments/grade",
        json!({
            "questions": questions,
            "answers": {"q1": "42", "q2": false},
            "passingScore": 50
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalScore"], 5.0);
    assert_eq!(body["maxScore"], 10.0);
    assert_eq!(body["percentage"], 50.0);
    assert_eq!(body["passed"], true);
    assert_eq!(body["results"]["q1"]["isCorrect"], true);
    assert_eq!(body["results"]["q2"]["isCorrect"], false);

    let (status, _) = post_json(
        &app,
        "/api/assessments/grade",
        json!({"questions": [], "answers": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/api/assessments/grade",
        json!({"questions": questions, "passingScore": 150}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let too_many: Vec<JsonValue> = (0..4)
        .map(|i| {
            json!({
                "id": format!("q{}", i),
                "type": "numeric",
                "content": "1 + 1?",
                "correctAnswer": 2
            })
        })
        .collect();
    let (status, body) = post_json(
        &app,
        "/api/assessments/grade",
        json!({ "questions": too_many }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
