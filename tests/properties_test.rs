use std::sync::Arc;

use proptest::prelude::*;
use question_engine::models::question::{
    ChoiceOption, Difficulty, MultipleChoiceDetails, Question, QuestionKind, QuestionMetadata,
    QuestionType,
};
use question_engine::services::detection_service::DetectionService;
use question_engine::services::grading_service::GradingService;
use question_engine::services::normalization_service::{NormalizationService, NormalizerSettings};
use question_engine::services::validation_service::ValidationService;
use question_engine::utils::id::SequentialIdGenerator;
use serde_json::{json, Map, Value as JsonValue};

const KEYS: &[&str] = &[
    "type",
    "question",
    "content",
    "prompt",
    "statement",
    "options",
    "choices",
    "correct_answer",
    "correctAnswer",
    "isCorrect",
    "text",
    "id",
    "visual",
    "subject",
    "grade",
    "points",
    "difficulty",
    "template",
    "blanks",
    "tolerance",
    "keywords",
    "acceptable_answers",
    "left_items",
    "right_items",
    "pairs",
    "correct_pairs",
    "items",
    "categories",
    "category",
    "correct_order",
    "position",
    "sequence",
    "labels",
    "label_bank",
    "criteria",
    "rubric",
    "metadata",
    "hints",
    "allow_multiple",
    "case_sensitive",
    "min_words",
    "order_type",
    "estimated_time",
];

const WORDS: &[&str] = &[
    "",
    "  ",
    "?",
    "___",
    "The ___ is ___.",
    "How many stars?",
    "True or false: the sun is hot",
    "🌟🌟🌟",
    "🍎 🍎",
    "N/A",
    "true",
    "False",
    "B",
    "c)",
    "opt_1",
    "left_0",
    "item_2",
    "cat_0",
    "3",
    "-2.5",
    "math",
    "hard",
    "multiple_choice",
    "counting",
    "fill_blank",
];

fn arb_leaf() -> impl Strategy<Value = JsonValue> {
    prop_oneof![
        Just(JsonValue::Null),
        any::<bool>().prop_map(JsonValue::from),
        (-20i64..20).prop_map(JsonValue::from),
        (-1.0e4f64..1.0e4).prop_map(JsonValue::from),
        prop::sample::select(WORDS).prop_map(JsonValue::from),
        "[a-zA-Z0-9 ?_.,:]{0,12}".prop_map(JsonValue::from),
    ]
}

fn arb_json() -> impl Strategy<Value = JsonValue> {
    arb_leaf().prop_recursive(3, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(JsonValue::Array),
            prop::collection::btree_map(prop::sample::select(KEYS), inner, 0..6).prop_map(
                |m| {
                    JsonValue::Object(
                        m.into_iter()
                            .map(|(k, v)| (k.to_string(), v))
                            .collect::<Map<_, _>>(),
                    )
                }
            ),
        ]
    })
}

/// Objects shaped like generator output: a prompt plus a handful of known keys.
fn arb_payload() -> impl Strategy<Value = JsonValue> {
    (
        prop::sample::select(WORDS),
        prop::collection::btree_map(prop::sample::select(KEYS), arb_json(), 0..8),
    )
        .prop_map(|(prompt, fields)| {
            let mut obj: Map<String, JsonValue> = fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            obj.entry("question".to_string())
                .or_insert_with(|| JsonValue::from(prompt));
            JsonValue::Object(obj)
        })
}

fn arb_type() -> impl Strategy<Value = QuestionType> {
    prop::sample::select(QuestionType::ALL.to_vec())
}

fn normalizer() -> NormalizationService {
    NormalizationService::new(
        Arc::new(SequentialIdGenerator::new("p")),
        NormalizerSettings::default(),
    )
}

proptest! {
    #[test]
    fn every_payload_normalizes_and_grades_within_bounds(
        payload in prop_oneof![arb_payload(), arb_json()],
        answer in arb_json(),
    ) {
        let normalized = normalizer().normalize(&payload);
        let question = normalized.question;
        prop_assert!(!question.id.is_empty());
        prop_assert!(serde_json::to_value(&question).is_ok());

        let report = ValidationService::new().validate(&question);
        let result = GradingService::default().grade(&question, &answer);
        prop_assert!(result.max_score.is_finite() && result.max_score >= 0.0);
        prop_assert!(result.score >= 0.0, "score {} below zero", result.score);
        prop_assert!(
            result.score <= result.max_score,
            "score {} above max {}",
            result.score,
            result.max_score
        );
        if !report.is_valid {
            prop_assert!(!result.is_valid);
            prop_assert_eq!(result.score, 0.0);
        }
        if result.requires_manual_review {
            prop_assert_eq!(result.is_correct, None);
        }
    }

    #[test]
    fn normalizing_canonical_output_changes_nothing_but_the_id(
        payload in arb_payload(),
        tag in prop::option::of(arb_type()),
    ) {
        let mut payload = payload;
        if let (Some(tag), Some(obj)) = (tag, payload.as_object_mut()) {
            obj.insert("type".to_string(), JsonValue::from(tag.as_str()));
        }
        let service = normalizer();
        let first = service.normalize(&payload).question;
        let canonical = serde_json::to_value(&first).unwrap();
        let mut second = service.normalize(&canonical).question;

        prop_assert_ne!(&second.id, &first.id);
        second.id = first.id.clone();
        prop_assert_eq!(second, first);
    }

    #[test]
    fn explicit_tags_are_kept(payload in arb_payload(), tag in arb_type()) {
        let mut payload = payload;
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("type".to_string(), JsonValue::from(tag.as_str()));
        }
        prop_assert_eq!(DetectionService::default().detect(&payload).question_type, tag);
        prop_assert_eq!(normalizer().normalize(&payload).question.question_type(), tag);
    }

    #[test]
    fn exact_selection_earns_full_credit(
        flags in prop::collection::vec(any::<bool>(), 2..7),
        force_multiple in any::<bool>(),
    ) {
        let mut flags = flags;
        if !flags.contains(&true) {
            flags[0] = true;
        }
        let correct_count = flags.iter().filter(|f| **f).count();
        let question = Question {
            id: "mc".to_string(),
            content: "Pick".to_string(),
            topic: String::new(),
            subject: String::new(),
            difficulty: Difficulty::Medium,
            points: 6.0,
            explanation: None,
            hints: Vec::new(),
            metadata: QuestionMetadata::default(),
            kind: QuestionKind::MultipleChoice(MultipleChoiceDetails {
                options: flags
                    .iter()
                    .enumerate()
                    .map(|(i, f)| ChoiceOption {
                        id: format!("opt_{}", i),
                        text: format!("choice {}", i),
                        is_correct: *f,
                    })
                    .collect(),
                allow_multiple: force_multiple || correct_count > 1,
            }),
        };
        prop_assert!(ValidationService::new().validate(&question).is_valid);

        let correct_ids: Vec<String> = flags
            .iter()
            .enumerate()
            .filter(|(_, f)| **f)
            .map(|(i, _)| format!("opt_{}", i))
            .collect();
        let grader = GradingService::default();
        let exact = grader.grade(&question, &json!(correct_ids));
        prop_assert_eq!(exact.is_correct, Some(true));
        prop_assert_eq!(exact.score, 6.0);

        if let Some(wrong) = flags.iter().position(|f| !*f) {
            let mut picked = correct_ids.clone();
            picked.push(format!("opt_{}", wrong));
            if correct_count == 1 && !force_multiple {
                picked = vec![format!("opt_{}", wrong)];
            }
            let result = grader.grade(&question, &json!(picked));
            prop_assert_eq!(result.is_correct, Some(false));
            prop_assert!(result.score < 6.0);
        }
    }
}

fn minimal(tag: QuestionType) -> JsonValue {
    let details = match tag {
        QuestionType::MultipleChoice => json!({
            "options": [
                {"id": "opt_0", "text": "a", "isCorrect": true},
                {"id": "opt_1", "text": "b", "isCorrect": false}
            ]
        }),
        QuestionType::TrueFalse => json!({"statement": "Ice is cold.", "correctAnswer": true}),
        QuestionType::FillBlank => json!({
            "template": "Ice is {{blank_0}}.",
            "blanks": [{"id": "blank_0", "correctAnswers": ["cold"]}]
        }),
        QuestionType::Numeric => json!({"correctAnswer": 4}),
        QuestionType::ShortAnswer => json!({"acceptableAnswers": ["Paris"]}),
        QuestionType::LongAnswer | QuestionType::Essay => json!({"sampleAnswer": "Anything."}),
        QuestionType::Matching => json!({
            "leftItems": [{"id": "left_0", "text": "dog"}],
            "rightItems": [{"id": "right_0", "text": "bark"}],
            "correctPairs": [{"leftId": "left_0", "rightId": "right_0"}]
        }),
        QuestionType::Ordering => json!({
            "items": [
                {"id": "item_0", "text": "one", "correctPosition": 1},
                {"id": "item_1", "text": "two", "correctPosition": 2}
            ]
        }),
        QuestionType::Classification => json!({
            "categories": [{"id": "cat_0", "name": "fruit"}],
            "items": [{"id": "item_0", "text": "apple", "correctCategory": "cat_0"}]
        }),
        QuestionType::VisualIdentification => json!({
            "visual": "🐱",
            "options": ["cat", "dog"],
            "correctAnswer": "cat"
        }),
        QuestionType::Counting => json!({"visual": "🌟🌟", "correctCount": 2}),
        QuestionType::PatternRecognition => json!({
            "sequence": ["1", "2", "3"],
            "options": ["4", "5"],
            "correctAnswer": "4"
        }),
        QuestionType::CodeCompletion => json!({
            "language": "rust",
            "template": "let x = {{blank_0}};",
            "blanks": [{"id": "blank_0", "correctAnswers": ["1"], "caseSensitive": true}]
        }),
        QuestionType::DiagramLabeling => json!({
            "diagram": "a tree",
            "labels": [{"id": "label_0", "correctLabel": "root"}],
            "labelBank": ["root", "leaf"]
        }),
        QuestionType::OpenEnded => json!({
            "criteria": [{"name": "clarity", "points": 5}]
        }),
    };
    let mut obj = details.as_object().cloned().unwrap_or_default();
    obj.insert("id".to_string(), json!(format!("{}-1", tag)));
    obj.insert("type".to_string(), json!(tag.as_str()));
    obj.insert("content".to_string(), json!("Question text"));
    JsonValue::Object(obj)
}

#[test]
fn minimal_instance_of_every_type_is_valid() {
    let validator = ValidationService::new();
    for tag in QuestionType::ALL {
        let question: Question = serde_json::from_value(minimal(tag))
            .unwrap_or_else(|e| panic!("{} did not deserialize: {}", tag, e));
        assert_eq!(question.question_type(), tag);
        let report = validator.validate(&question);
        assert!(report.is_valid, "{} rejected: {:?}", tag, report.errors);
    }
}

#[test]
fn minimal_instances_survive_normalization() {
    let service = normalizer();
    let validator = ValidationService::new();
    for tag in QuestionType::ALL {
        let normalized = service.normalize(&minimal(tag));
        assert_eq!(normalized.question.question_type(), tag);
        let report = validator.validate(&normalized.question);
        assert!(report.is_valid, "{} rejected after normalizing: {:?}", tag, report.errors);
    }
}
