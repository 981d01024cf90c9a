//! Turns raw generator payloads into canonical [`Question`]s.
//!
//! One conversion per discriminant tag, all total: a missing or unusable field is
//! replaced by a default and recorded as a [`ContentIssue`] instead of failing. Sub-item
//! ids are positional so normalizing an already canonical question reproduces it; only
//! the question id is fresh on every call.

use crate::models::question::{
    BloomLevel, Blank, Category, ChoiceOption, ClassificationDetails, ClassifyItem,
    CodeCompletionDetails, CountingDetails, DiagramLabelingDetails, Difficulty,
    FillBlankDetails, LabelPoint, LongFormDetails, MatchItem, MatchPair, MatchingDetails,
    MultipleChoiceDetails, NumericDetails, OpenEndedDetails, OrderItem, OrderType,
    OrderingDetails, PatternRecognitionDetails, Question, QuestionKind, QuestionMetadata,
    QuestionType, RubricCriterion, ShortAnswerDetails, TrueFalseDetails,
    VisualIdentificationDetails, DEFAULT_TOLERANCE,
};
use crate::models::report::{ContentIssue, Normalized};
use crate::services::detection_service::{DetectionService, DetectorPolicy};
use crate::utils::glyphs;
use crate::utils::id::IdGenerator;
use crate::utils::raw::{value_number, value_text, RawOption, RawPayload};
use crate::utils::text;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizerSettings {
    pub default_points: f64,
    pub default_difficulty: Difficulty,
    pub numeric_tolerance: f64,
    pub detector: DetectorPolicy,
    pub max_batch: usize,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            default_points: 10.0,
            default_difficulty: Difficulty::Medium,
            numeric_tolerance: DEFAULT_TOLERANCE,
            detector: DetectorPolicy::default(),
            max_batch: 200,
        }
    }
}

/// Issue sink for one conversion.
#[derive(Debug, Default)]
struct Issues(Vec<ContentIssue>);

impl Issues {
    fn missing(&mut self, field: &str, fallback: impl Into<String>) {
        let fallback = fallback.into();
        tracing::warn!(field, fallback = %fallback, "substituting default for missing field");
        self.0.push(ContentIssue::missing(field, fallback));
    }

    fn ambiguous(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(detail = %detail, "ambiguous content");
        self.0.push(ContentIssue::ambiguous(detail));
    }
}

#[derive(Clone, Debug)]
pub struct NormalizationService {
    ids: Arc<dyn IdGenerator>,
    detector: DetectionService,
    settings: NormalizerSettings,
}

impl NormalizationService {
    pub fn new(ids: Arc<dyn IdGenerator>, settings: NormalizerSettings) -> Self {
        Self {
            ids,
            detector: DetectionService::new(settings.detector),
            settings,
        }
    }

    pub fn settings(&self) -> &NormalizerSettings {
        &self.settings
    }

    pub fn detector(&self) -> &DetectionService {
        &self.detector
    }

    /// Detects the type, then converts.
    pub fn normalize(&self, raw: &JsonValue) -> Normalized {
        let detection = self.detector.detect(raw);
        let mut normalized = self.normalize_as(detection.question_type, raw);
        let mut issues = detection.issues;
        issues.append(&mut normalized.issues);
        normalized.issues = issues;
        normalized
    }

    /// Converts as the given type without running detection.
    pub fn normalize_as(&self, question_type: QuestionType, raw: &JsonValue) -> Normalized {
        let payload = RawPayload::new(raw);
        let mut issues = Issues::default();
        let s = &self.settings;

        let kind = match question_type {
            QuestionType::MultipleChoice => multiple_choice(&payload, &mut issues),
            QuestionType::TrueFalse => true_false(&payload, &mut issues),
            QuestionType::FillBlank => fill_blank(&payload, &mut issues),
            QuestionType::Numeric => numeric(&payload, s, &mut issues),
            QuestionType::ShortAnswer => short_answer(&payload, &mut issues),
            QuestionType::LongAnswer => QuestionKind::LongAnswer(long_form(&payload)),
            QuestionType::Essay => QuestionKind::Essay(long_form(&payload)),
            QuestionType::Matching => matching(&payload, &mut issues),
            QuestionType::Ordering => ordering(&payload, &mut issues),
            QuestionType::Classification => classification(&payload, &mut issues),
            QuestionType::VisualIdentification => visual_identification(&payload, &mut issues),
            QuestionType::Counting => counting(&payload, &mut issues),
            QuestionType::PatternRecognition => pattern_recognition(&payload, &mut issues),
            QuestionType::CodeCompletion => code_completion(&payload, &mut issues),
            QuestionType::DiagramLabeling => diagram_labeling(&payload, &mut issues),
            QuestionType::OpenEnded => open_ended(&payload),
        };

        let question = self.base(&payload, kind, &mut issues);
        Normalized {
            question,
            issues: issues.0,
        }
    }

    /// Accepts `{"questions": [...]}` or a bare array; anything past `max_batch` is dropped.
    pub fn normalize_batch(&self, raw: &JsonValue) -> Vec<Normalized> {
        let items: &[JsonValue] = match raw.get("questions").and_then(|q| q.as_array()) {
            Some(arr) => arr,
            None => raw.as_array().map(Vec::as_slice).unwrap_or(&[]),
        };
        if items.len() > self.settings.max_batch {
            tracing::warn!(
                received = items.len(),
                kept = self.settings.max_batch,
                "batch truncated"
            );
        }
        items
            .iter()
            .take(self.settings.max_batch)
            .map(|item| self.normalize(item))
            .collect()
    }

    fn base(&self, raw: &RawPayload<'_>, kind: QuestionKind, issues: &mut Issues) -> Question {
        let question_type = kind.question_type();

        let content = raw.prompt().unwrap_or_else(|| {
            let fallback = match &kind {
                QuestionKind::TrueFalse(tf) if !tf.statement.is_empty() => tf.statement.clone(),
                QuestionKind::FillBlank(fb) => fb.template.clone(),
                _ => "Untitled question".to_string(),
            };
            issues.missing("question", format!("\"{}\"", fallback));
            fallback
        });

        let difficulty = match raw.string("difficulty", "difficulty") {
            Some(d) => Difficulty::parse(&d).unwrap_or_else(|| {
                issues.ambiguous(format!("unknown difficulty `{}`", d));
                self.settings.default_difficulty
            }),
            None => self.settings.default_difficulty,
        };

        let points = match raw.number("points", "points") {
            Some(p) if p >= 0.0 => p,
            Some(p) => {
                issues.ambiguous(format!("negative points {} replaced", p));
                self.settings.default_points
            }
            None => self.settings.default_points,
        };

        let meta = raw.key("metadata").map(RawPayload::new);
        let blooms_level = raw
            .string("blooms_level", "bloomsLevel")
            .or_else(|| meta.and_then(|m| m.string("blooms_level", "bloomsLevel")))
            .and_then(|b| BloomLevel::parse(&b))
            .unwrap_or_default();
        let estimated_time = raw
            .number("estimated_time", "estimatedTime")
            .or_else(|| meta.and_then(|m| m.number("estimated_time", "estimatedTime")))
            .filter(|t| *t >= 0.0)
            .map(|t| t.round() as u32)
            .unwrap_or_else(|| default_estimated_time(question_type));

        Question {
            id: self.ids.next_id(),
            content,
            topic: raw.string("topic", "topic").unwrap_or_default(),
            subject: raw.string("subject", "subject").unwrap_or_default(),
            difficulty,
            points,
            explanation: raw.string("explanation", "explanation"),
            hints: raw.string_list("hints", "hints"),
            metadata: QuestionMetadata {
                blooms_level,
                estimated_time,
                grade_level: raw.grade(),
            },
            kind,
        }
    }
}

fn default_estimated_time(t: QuestionType) -> u32 {
    match t {
        QuestionType::LongAnswer | QuestionType::Essay | QuestionType::OpenEnded => 300,
        QuestionType::FillBlank
        | QuestionType::ShortAnswer
        | QuestionType::Matching
        | QuestionType::Ordering
        | QuestionType::Classification
        | QuestionType::CodeCompletion
        | QuestionType::DiagramLabeling => 60,
        _ => 30,
    }
}

// ---------------------------------------------------------------------------
// Choice resolution
// ---------------------------------------------------------------------------

/// Maps one answer reference onto an option index. A literal match on option text
/// wins over reading a number as a position, so "3" among numeric options means the
/// option reading 3.
fn resolve_choice(options: &[RawOption], answer: &JsonValue) -> Option<usize> {
    match answer {
        JsonValue::Number(n) => {
            let n = n.as_f64()?;
            literal_number(options, n).or_else(|| index_of(options.len(), n))
        }
        JsonValue::String(s) => {
            if let Some(i) = options
                .iter()
                .position(|o| o.text == s.trim())
                .or_else(|| options.iter().position(|o| text::eq_loose(&o.text, s)))
            {
                return Some(i);
            }
            if let Some(i) = options
                .iter()
                .position(|o| o.id.as_deref().is_some_and(|id| id == s.trim()))
            {
                return Some(i);
            }
            if let Some(n) = text::parse_number_strict(s) {
                return literal_number(options, n).or_else(|| index_of(options.len(), n));
            }
            text::option_letter_index(s).filter(|i| *i < options.len())
        }
        JsonValue::Bool(b) => options
            .iter()
            .position(|o| text::truth_value(&o.text) == Some(*b)),
        JsonValue::Object(obj) => ["id", "text", "value", "label", "index"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| resolve_choice(options, v))),
        _ => None,
    }
}

fn resolve_choices(options: &[RawOption], answer: &JsonValue) -> Vec<usize> {
    let mut out: Vec<usize> = match answer {
        JsonValue::Array(items) => items
            .iter()
            .filter_map(|a| resolve_choice(options, a))
            .collect(),
        other => resolve_choice(options, other).into_iter().collect(),
    };
    out.sort_unstable();
    out.dedup();
    out
}

fn literal_number(options: &[RawOption], n: f64) -> Option<usize> {
    options
        .iter()
        .position(|o| text::parse_number_strict(&o.text) == Some(n))
}

fn index_of(len: usize, n: f64) -> Option<usize> {
    (n.fract() == 0.0 && n >= 0.0 && (n as usize) < len).then_some(n as usize)
}

/// Correct answer as option text when it points into `options`, else as literal text.
fn resolved_answer_text(options: &[RawOption], answer: &JsonValue) -> Option<String> {
    resolve_choice(options, answer)
        .map(|i| options[i].text.clone())
        .or_else(|| value_text(answer))
}

// ---------------------------------------------------------------------------
// Per-type conversions
// ---------------------------------------------------------------------------

fn multiple_choice(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let options = raw.options();
    if options.len() < 2 {
        issues.missing(
            "options",
            format!("{} option(s) as provided", options.len()),
        );
    }

    let mut correct: Vec<usize> = options
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_correct == Some(true))
        .map(|(i, _)| i)
        .collect();

    if correct.is_empty() {
        if let Some(answer) = raw.correct_answer() {
            correct = resolve_choices(&options, answer);
            if correct.is_empty() {
                issues.ambiguous(format!(
                    "correct answer {} matches no option",
                    answer
                ));
            }
        }
    }

    if correct.is_empty() && !options.is_empty() {
        issues.missing("correct_answer", "first option");
        correct.push(0);
    }

    let mut allow_multiple = raw
        .boolean("allow_multiple", "allowMultiple")
        .unwrap_or(correct.len() > 1);
    if !allow_multiple && correct.len() > 1 {
        issues.ambiguous("several correct options on a single-answer question, allowing multiple");
        allow_multiple = true;
    }

    QuestionKind::MultipleChoice(MultipleChoiceDetails {
        options: options
            .into_iter()
            .enumerate()
            .map(|(i, o)| ChoiceOption {
                id: format!("opt_{}", i),
                text: o.text,
                is_correct: correct.contains(&i),
            })
            .collect(),
        allow_multiple,
    })
}

fn true_false(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let statement = raw
        .string("statement", "statement")
        .or_else(|| {
            raw.prompt()
                .map(|p| strip_true_false_prefix(&p))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| raw.prompt())
        .unwrap_or_else(|| {
            issues.missing("statement", "Untitled statement");
            "Untitled statement".to_string()
        });

    let options = raw.options();
    let correct = raw.correct_answer().and_then(|answer| match answer {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => text::truth_value(s)
            .or_else(|| resolved_answer_text(&options, answer).and_then(|t| text::truth_value(&t))),
        JsonValue::Number(n) => {
            let n = n.as_f64()?;
            if options.is_empty() {
                Some(n != 0.0)
            } else {
                index_of(options.len(), n).and_then(|i| text::truth_value(&options[i].text))
            }
        }
        _ => None,
    });

    let correct_answer = correct.unwrap_or_else(|| {
        issues.missing("correct_answer", "true (first option)");
        true
    });

    QuestionKind::TrueFalse(TrueFalseDetails {
        statement,
        correct_answer,
    })
}

fn strip_true_false_prefix(prompt: &str) -> String {
    let prompt = prompt.trim();
    for prefix in ["true or false:", "true or false?", "true/false:", "true or false"] {
        let head = prompt.get(..prefix.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
            return prompt[prefix.len()..].trim().to_string();
        }
    }
    prompt.to_string()
}

fn fill_blank(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let source = raw
        .string("template", "template")
        .or_else(|| raw.prompt())
        .unwrap_or_default();
    let (template, blanks) = build_blanks(raw, &source, false, issues);
    QuestionKind::FillBlank(FillBlankDetails { template, blanks })
}

fn code_completion(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let source = raw
        .string("code_template", "codeTemplate")
        .or_else(|| raw.string("template", "template"))
        .or_else(|| raw.string("code", "code"))
        .or_else(|| raw.prompt())
        .unwrap_or_default();
    let (template, blanks) = build_blanks(raw, &source, true, issues);
    QuestionKind::CodeCompletion(CodeCompletionDetails {
        language: raw
            .string("language", "language")
            .unwrap_or_else(|| "plaintext".to_string()),
        template,
        blanks,
        allow_partial_credit: raw
            .boolean("allow_partial_credit", "allowPartialCredit")
            .unwrap_or(true),
    })
}

/// Shared by fill-in-the-blank and code completion. Each underscore run in `source`
/// becomes its own `{{blank_N}}` placeholder; existing placeholders keep their ids.
fn build_blanks(
    raw: &RawPayload<'_>,
    source: &str,
    default_case_sensitive: bool,
    issues: &mut Issues,
) -> (String, Vec<Blank>) {
    let case_sensitive = raw
        .boolean("case_sensitive", "caseSensitive")
        .unwrap_or(default_case_sensitive);

    let declared: Vec<Blank> = raw
        .key("blanks")
        .and_then(|b| b.as_array())
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| declared_blank(item, i, case_sensitive))
                .collect()
        })
        .unwrap_or_default();

    let spans = text::placeholder_spans(source);
    let markers: Vec<_> = text::blank_markers(source)
        .into_iter()
        .filter(|m| !spans.iter().any(|(p, _)| p.start < m.end && m.start < p.end))
        .collect();

    let mut ids: Vec<String> = Vec::new();
    let mut template = String::with_capacity(source.len() + markers.len() * 8);
    let mut last = 0;
    if spans.is_empty() {
        ids = declared.iter().map(|b| b.id.clone()).collect();
        dedup_keep_order(&mut ids);
        for (i, range) in markers.iter().enumerate() {
            if ids.len() <= i {
                let id = fresh_blank_id(&ids, i);
                ids.push(id);
            }
            template.push_str(&source[last..range.start]);
            template.push_str(&text::placeholder(&ids[i]));
            last = range.end;
        }
        template.push_str(&source[last..]);

        if ids.is_empty() {
            issues.missing("template blank", "one blank appended to the prompt");
            ids.push("blank_0".to_string());
        }
        for id in ids.iter().skip(markers.len()) {
            if !template.is_empty() {
                template.push(' ');
            }
            template.push_str(&text::placeholder(id));
        }
    } else {
        // Placeholders keep their ids; markers between them get fresh ones, in template order.
        let mut taken: Vec<String> = spans.iter().map(|(_, id)| id.clone()).collect();
        let mut events: Vec<_> = spans
            .iter()
            .map(|(range, id)| (range.clone(), Some(id.as_str())))
            .chain(markers.iter().map(|range| (range.clone(), None)))
            .collect();
        events.sort_by_key(|(range, _)| range.start);
        for (range, id) in events {
            match id {
                Some(id) => {
                    if !ids.iter().any(|known| known == id) {
                        ids.push(id.to_string());
                    }
                }
                None => {
                    let id = fresh_blank_id(&taken, ids.len());
                    template.push_str(&source[last..range.start]);
                    template.push_str(&text::placeholder(&id));
                    last = range.end;
                    taken.push(id.clone());
                    ids.push(id);
                }
            }
        }
        template.push_str(&source[last..]);
    }

    if !declared.is_empty() {
        let blanks = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                declared
                    .iter()
                    .find(|b| &b.id == id)
                    .or_else(|| declared.get(i))
                    .map(|b| Blank {
                        id: id.clone(),
                        ..b.clone()
                    })
                    .unwrap_or_else(|| Blank {
                        id: id.clone(),
                        correct_answers: declared[0].correct_answers.clone(),
                        case_sensitive,
                    })
            })
            .collect();
        return (template, blanks);
    }

    let answers = raw
        .correct_answer()
        .or_else(|| raw.get("answers", "answers"));
    let per_blank: Vec<Vec<String>> = match answers {
        Some(JsonValue::Array(items)) if !items.is_empty() => {
            items.iter().map(answer_alternatives).collect()
        }
        Some(other) => vec![answer_alternatives(other)],
        None => Vec::new(),
    };
    if per_blank.iter().all(|a| a.is_empty()) {
        issues.missing("correct_answer", "blanks without accepted answers");
    }

    let blanks = ids
        .iter()
        .enumerate()
        .map(|(i, id)| Blank {
            id: id.clone(),
            correct_answers: per_blank
                .get(i)
                .or_else(|| per_blank.first())
                .cloned()
                .unwrap_or_default(),
            case_sensitive,
        })
        .collect();
    (template, blanks)
}

/// First positional `blank_N` id, starting at `from`, not already taken.
fn fresh_blank_id(ids: &[String], from: usize) -> String {
    (from..)
        .map(|n| format!("blank_{}", n))
        .find(|id| !ids.contains(id))
        .unwrap_or_default()
}

/// Ids end up inside `{{..}}`, so braces would not survive a re-read.
fn is_plain_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['{', '}'])
}

fn declared_blank(item: &JsonValue, index: usize, case_sensitive: bool) -> Option<Blank> {
    let obj = match item {
        JsonValue::Object(obj) => obj,
        other => {
            let answers = answer_alternatives(other);
            return (!answers.is_empty()).then(|| Blank {
                id: format!("blank_{}", index),
                correct_answers: answers,
                case_sensitive,
            });
        }
    };
    let blank = RawPayload::new(item);
    let answers = blank
        .get("correct_answers", "correctAnswers")
        .or_else(|| blank.first(&["answers", "answer"]))
        .or_else(|| blank.correct_answer())
        .map(answer_alternatives)
        .unwrap_or_default();
    Some(Blank {
        id: obj
            .get("id")
            .and_then(value_text)
            .filter(|id| is_plain_id(id))
            .unwrap_or_else(|| format!("blank_{}", index)),
        correct_answers: answers,
        case_sensitive: blank
            .boolean("case_sensitive", "caseSensitive")
            .unwrap_or(case_sensitive),
    })
}

fn answer_alternatives(v: &JsonValue) -> Vec<String> {
    match v {
        JsonValue::Array(items) => items.iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}

fn numeric(raw: &RawPayload<'_>, settings: &NormalizerSettings, issues: &mut Issues) -> QuestionKind {
    let options = raw.options();
    let stated = raw.correct_answer().and_then(|a| match a {
        JsonValue::Number(_) if options.is_empty() => value_number(a),
        _ => resolved_answer_text(&options, a)
            .and_then(|t| text::parse_number_permissive(&t)),
    });
    let correct_answer = stated.unwrap_or_else(|| {
        issues.missing("correct_answer", "0");
        0.0
    });
    let tolerance = raw
        .number("tolerance", "tolerance")
        .map(f64::abs)
        .unwrap_or(settings.numeric_tolerance);

    QuestionKind::Numeric(NumericDetails {
        correct_answer,
        tolerance,
        unit: raw.string("unit", "unit"),
    })
}

fn short_answer(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let options = raw.options();
    let mut acceptable = raw.string_list("acceptable_answers", "acceptableAnswers");
    match raw.correct_answer() {
        Some(JsonValue::Array(items)) => {
            acceptable.extend(items.iter().filter_map(|a| resolved_answer_text(&options, a)))
        }
        Some(other) => acceptable.extend(resolved_answer_text(&options, other)),
        None => {}
    }
    dedup_keep_order(&mut acceptable);

    let mut keywords = raw.string_list("keywords", "keywords");
    keywords.extend(raw.string_list("expected_keywords", "expectedKeywords"));
    dedup_keep_order(&mut keywords);

    if acceptable.is_empty() && keywords.is_empty() {
        issues.missing("correct_answer", "no accepted answers");
    }

    QuestionKind::ShortAnswer(ShortAnswerDetails {
        acceptable_answers: acceptable,
        keywords,
        case_sensitive: raw
            .boolean("case_sensitive", "caseSensitive")
            .unwrap_or(false),
    })
}

fn dedup_keep_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|i| seen.insert(i.clone()));
}

fn long_form(raw: &RawPayload<'_>) -> LongFormDetails {
    let rubric = raw.key("rubric").and_then(|r| match r {
        JsonValue::String(_) => value_text(r),
        other => serde_json::to_string(other).ok(),
    });
    LongFormDetails {
        min_words: raw.number("min_words", "minWords").map(|n| n.max(0.0) as u32),
        max_words: raw.number("max_words", "maxWords").map(|n| n.max(0.0) as u32),
        rubric,
        sample_answer: raw
            .string("sample_answer", "sampleAnswer")
            .or_else(|| raw.correct_answer().and_then(value_text)),
    }
}

/// Text plus the id the generator used for it, if any.
struct Labeled {
    raw_id: Option<String>,
    text: String,
}

fn labeled(item: &JsonValue, text_keys: &[&str]) -> Option<Labeled> {
    match item {
        JsonValue::Object(obj) => {
            let text = text_keys
                .iter()
                .find_map(|k| obj.get(*k).and_then(value_text))?;
            Some(Labeled {
                raw_id: obj.get("id").and_then(value_text),
                text,
            })
        }
        other => value_text(other).map(|text| Labeled { raw_id: None, text }),
    }
}

fn labeled_list(v: Option<&JsonValue>, text_keys: &[&str]) -> Vec<Labeled> {
    match v {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| labeled(item, text_keys))
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolves a reference by raw id, then text, then position.
fn resolve_ref(items: &[Labeled], reference: &JsonValue) -> Option<usize> {
    if let Some(s) = reference.as_str() {
        let s = s.trim();
        if let Some(i) = items.iter().position(|l| l.raw_id.as_deref() == Some(s)) {
            return Some(i);
        }
        if let Some(i) = items.iter().position(|l| text::eq_loose(&l.text, s)) {
            return Some(i);
        }
    }
    match reference {
        JsonValue::Number(n) => n.as_f64().and_then(|n| index_of(items.len(), n)),
        JsonValue::Object(obj) => ["id", "text"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| resolve_ref(items, v))),
        _ => None,
    }
}

fn push_unique(items: &mut Vec<Labeled>, text: String) -> usize {
    if let Some(i) = items.iter().position(|l| text::eq_loose(&l.text, &text)) {
        return i;
    }
    items.push(Labeled { raw_id: None, text });
    items.len() - 1
}

/// Both ends of a pair as text from `{left,right}`-like objects or `[l, r]` arrays.
fn pair_ends(v: &JsonValue) -> Option<(&JsonValue, &JsonValue)> {
    match v {
        JsonValue::Array(ends) if ends.len() == 2 => Some((&ends[0], &ends[1])),
        JsonValue::Object(obj) => {
            let left = ["left_id", "leftId", "left", "term", "prompt", "item"]
                .iter()
                .find_map(|k| obj.get(*k))?;
            let right = ["right_id", "rightId", "right", "definition", "match", "answer"]
                .iter()
                .find_map(|k| obj.get(*k))?;
            Some((left, right))
        }
        _ => None,
    }
}

fn matching(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    const TEXT_KEYS: &[&str] = &["text", "label", "value", "content"];
    let mut left = labeled_list(raw.get("left_items", "leftItems"), TEXT_KEYS);
    let mut right = labeled_list(raw.get("right_items", "rightItems"), TEXT_KEYS);
    let mut pairs: Vec<(usize, usize)> = Vec::new();

    if let Some(JsonValue::Array(declared)) = raw.get("correct_pairs", "correctPairs") {
        for p in declared {
            let Some((l, r)) = pair_ends(p) else { continue };
            if let (Some(li), Some(ri)) = (resolve_ref(&left, l), resolve_ref(&right, r)) {
                pairs.push((li, ri));
            }
        }
    }

    let pair_source = raw
        .key("pairs")
        .or_else(|| raw.correct_answer().filter(|a| a.is_object() || a.is_array()));
    if pairs.is_empty() {
        match pair_source {
            Some(JsonValue::Array(items)) => {
                for p in items {
                    let Some((l, r)) = pair_ends(p) else { continue };
                    let (Some(lt), Some(rt)) = (value_text(l), value_text(r)) else {
                        continue;
                    };
                    let li = resolve_ref(&left, l).unwrap_or_else(|| push_unique(&mut left, lt));
                    let ri = resolve_ref(&right, r).unwrap_or_else(|| push_unique(&mut right, rt));
                    pairs.push((li, ri));
                }
            }
            Some(JsonValue::Object(map)) => {
                for (l, r) in map {
                    let Some(rt) = value_text(r) else { continue };
                    let li = resolve_ref(&left, &JsonValue::String(l.clone()))
                        .unwrap_or_else(|| push_unique(&mut left, l.clone()));
                    let ri = resolve_ref(&right, r).unwrap_or_else(|| push_unique(&mut right, rt));
                    pairs.push((li, ri));
                }
            }
            _ => {}
        }
    }

    if pairs.is_empty() && !left.is_empty() && left.len() == right.len() {
        issues.missing("correct_pairs", "left and right items paired by position");
        pairs = (0..left.len()).map(|i| (i, i)).collect();
    }
    if pairs.is_empty() {
        issues.missing("pairs", "no pairs");
    }

    // One pair per left item; the first declaration wins.
    let mut seen = std::collections::HashSet::new();
    pairs.retain(|(l, _)| seen.insert(*l));
    pairs.sort_unstable();

    QuestionKind::Matching(MatchingDetails {
        left_items: left
            .iter()
            .enumerate()
            .map(|(i, l)| MatchItem {
                id: format!("left_{}", i),
                text: l.text.clone(),
            })
            .collect(),
        right_items: right
            .iter()
            .enumerate()
            .map(|(i, r)| MatchItem {
                id: format!("right_{}", i),
                text: r.text.clone(),
            })
            .collect(),
        correct_pairs: pairs
            .into_iter()
            .map(|(l, r)| MatchPair {
                left_id: format!("left_{}", l),
                right_id: format!("right_{}", r),
            })
            .collect(),
        allow_partial_credit: raw
            .boolean("allow_partial_credit", "allowPartialCredit")
            .unwrap_or(true),
    })
}

fn ordering(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    const TEXT_KEYS: &[&str] = &["text", "label", "value"];
    let (mut items, mut positions): (Vec<Labeled>, Vec<Option<f64>>) = match raw.key("items") {
        Some(JsonValue::Array(raw_items)) => raw_items
            .iter()
            .filter_map(|item| {
                let position = RawPayload::new(item)
                    .get("correct_position", "correctPosition")
                    .or_else(|| item.get("position"))
                    .or_else(|| item.get("order"))
                    .and_then(value_number);
                labeled(item, TEXT_KEYS).map(|l| (l, position))
            })
            .unzip(),
        _ => (Vec::new(), Vec::new()),
    };

    if positions.iter().all(Option::is_none) {
        let order = raw
            .get("correct_order", "correctOrder")
            .or_else(|| raw.correct_answer());
        if let Some(JsonValue::Array(order)) = order {
            if items.is_empty() {
                items = order.iter().filter_map(|o| labeled(o, TEXT_KEYS)).collect();
                positions = (0..items.len()).map(|i| Some(i as f64)).collect();
            } else {
                for (rank, reference) in order.iter().enumerate() {
                    if let Some(i) = resolve_ref(&items, reference) {
                        positions[i].get_or_insert(rank as f64);
                    }
                }
                if positions.iter().any(Option::is_none) {
                    issues.ambiguous("correct order leaves items out, placing them last");
                }
            }
        }
    }
    let mut entries: Vec<(Labeled, Option<f64>)> = items.into_iter().zip(positions).collect();

    if entries.len() < 2 {
        issues.missing("items", format!("{} item(s)", entries.len()));
    }

    // Stable, so unpositioned items keep their given order after the positioned ones.
    entries.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let order_type = match raw.string("order_type", "orderType") {
        Some(t) => OrderType::parse(&t).unwrap_or_else(|| {
            issues.ambiguous(format!("unknown order type `{}`", t));
            OrderType::Sequence
        }),
        None => OrderType::Sequence,
    };

    QuestionKind::Ordering(OrderingDetails {
        items: entries
            .into_iter()
            .enumerate()
            .map(|(pos, (l, _))| OrderItem {
                id: format!("item_{}", pos),
                text: l.text,
                correct_position: pos + 1,
            })
            .collect(),
        order_type,
        allow_partial_credit: raw
            .boolean("allow_partial_credit", "allowPartialCredit")
            .unwrap_or(true),
    })
}

fn classification(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let mut categories: Vec<Labeled> = Vec::new();
    let mut items: Vec<(String, Option<JsonValue>)> = Vec::new();

    match raw.key("categories") {
        Some(JsonValue::Array(_)) => {
            categories = labeled_list(raw.key("categories"), &["name", "label", "title", "text"]);
        }
        Some(JsonValue::Object(map)) => {
            for (name, members) in map {
                categories.push(Labeled {
                    raw_id: None,
                    text: name.clone(),
                });
                for m in answer_alternatives(members) {
                    items.push((m, Some(JsonValue::String(name.clone()))));
                }
            }
        }
        _ => {}
    }

    if let Some(JsonValue::Array(raw_items)) = raw.key("items") {
        for item in raw_items {
            match item {
                JsonValue::Object(obj) => {
                    let Some(text) = ["text", "item", "name", "label"]
                        .iter()
                        .find_map(|k| obj.get(*k).and_then(value_text))
                    else {
                        continue;
                    };
                    let category = RawPayload::new(item)
                        .get("correct_category", "correctCategory")
                        .or_else(|| obj.get("category"))
                        .cloned();
                    items.push((text, category));
                }
                other => {
                    if let Some(text) = value_text(other) {
                        items.push((text, None));
                    }
                }
            }
        }
    }

    // A `{item: category}` answer map fills in categories the items lack.
    if let Some(JsonValue::Object(answer_map)) = raw.correct_answer() {
        for (item_text, category) in answer_map {
            match items.iter().position(|(t, _)| text::eq_loose(t, item_text)) {
                Some(i) => {
                    items[i].1.get_or_insert_with(|| category.clone());
                }
                None => items.push((item_text.clone(), Some(category.clone()))),
            }
        }
    }

    let mut resolved: Vec<ClassifyItem> = Vec::with_capacity(items.len());
    for (i, (text_value, category)) in items.into_iter().enumerate() {
        let cat_index = match category.as_ref() {
            Some(c) => resolve_ref(&categories, c).or_else(|| {
                value_text(c).map(|name| {
                    issues.ambiguous(format!("category `{}` was not declared, adding it", name));
                    push_unique(&mut categories, name)
                })
            }),
            None => None,
        };
        let cat_index = match cat_index {
            Some(c) => c,
            None => {
                issues.missing(&format!("items[{}].category", i), "first category");
                if categories.is_empty() {
                    categories.push(Labeled {
                        raw_id: None,
                        text: "Uncategorized".to_string(),
                    });
                }
                0
            }
        };
        resolved.push(ClassifyItem {
            id: format!("item_{}", i),
            text: text_value,
            correct_category: format!("cat_{}", cat_index),
        });
    }

    if categories.is_empty() {
        issues.missing("categories", "no categories");
    }
    if resolved.is_empty() {
        issues.missing("items", "no items");
    }

    QuestionKind::Classification(ClassificationDetails {
        categories: categories
            .into_iter()
            .enumerate()
            .map(|(i, c)| Category {
                id: format!("cat_{}", i),
                name: c.text,
            })
            .collect(),
        items: resolved,
        allow_partial_credit: raw
            .boolean("allow_partial_credit", "allowPartialCredit")
            .unwrap_or(true),
    })
}

fn visual_identification(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let visual = raw.visual();
    if visual.is_none() {
        issues.missing("visual", "text-only prompt");
    }
    let options = raw.options();
    let correct_answer = raw
        .correct_answer()
        .and_then(|a| resolved_answer_text(&options, a))
        .or_else(|| {
            let first = options.first().map(|o| o.text.clone());
            issues.missing(
                "correct_answer",
                if first.is_some() { "first option" } else { "empty answer" },
            );
            first
        })
        .unwrap_or_default();

    QuestionKind::VisualIdentification(VisualIdentificationDetails {
        visual,
        options: options.into_iter().map(|o| o.text).collect(),
        correct_answer,
    })
}

fn counting(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let visual = raw.visual();
    let options = raw.options();
    let glyph_count = visual.as_deref().map(glyphs::count_glyphs).unwrap_or(0);

    let stated = raw
        .number("correct_count", "correctCount")
        .or_else(|| {
            raw.correct_answer().and_then(|a| {
                resolved_answer_text(&options, a).and_then(|t| text::parse_number_permissive(&t))
            })
        })
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as u32);

    let correct_count = if glyph_count > 0 {
        if let Some(s) = stated.filter(|s| *s as usize != glyph_count) {
            issues.ambiguous(format!(
                "stated count {} disagrees with {} glyphs in the visual; using the glyph count",
                s, glyph_count
            ));
        }
        glyph_count as u32
    } else {
        stated.unwrap_or_else(|| {
            issues.missing("correct_answer", "0");
            0
        })
    };

    QuestionKind::Counting(CountingDetails {
        visual,
        correct_count,
        options: options.into_iter().map(|o| o.text).collect(),
    })
}

fn pattern_recognition(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let mut sequence: Vec<String> = match raw.first(&["sequence", "pattern"]) {
        Some(JsonValue::Array(items)) => items.iter().filter_map(value_text).collect(),
        Some(JsonValue::String(s)) => split_sequence(s),
        _ => Vec::new(),
    };
    while sequence
        .last()
        .is_some_and(|l| l == "?" || text::has_blank_marker(l))
    {
        sequence.pop();
    }
    if sequence.is_empty() {
        issues.missing("pattern", "empty sequence");
    }

    let options = raw.options();
    let correct_answer = raw
        .get("next_item", "nextItem")
        .or_else(|| raw.correct_answer())
        .and_then(|a| resolved_answer_text(&options, a))
        .or_else(|| {
            let first = options.first().map(|o| o.text.clone());
            issues.missing(
                "correct_answer",
                if first.is_some() { "first option" } else { "empty answer" },
            );
            first
        })
        .unwrap_or_default();

    QuestionKind::PatternRecognition(PatternRecognitionDetails {
        sequence,
        correct_answer,
        options: options.into_iter().map(|o| o.text).collect(),
        rule: raw
            .string("rule", "rule")
            .or_else(|| raw.string("pattern_rule", "patternRule")),
    })
}

fn split_sequence(s: &str) -> Vec<String> {
    let parts: Vec<String> = if s.contains(',') {
        s.split(',').map(|p| p.trim().to_string()).collect()
    } else if glyphs::is_glyph_only(s) {
        glyphs::glyph_clusters(s)
    } else {
        s.split_whitespace().map(str::to_string).collect()
    };
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

fn diagram_labeling(raw: &RawPayload<'_>, issues: &mut Issues) -> QuestionKind {
    let diagram = raw.visual();
    let mut labels: Vec<LabelPoint> = Vec::new();

    if let Some(JsonValue::Array(items)) = raw
        .key("labels")
        .or_else(|| raw.get("label_points", "labelPoints"))
    {
        for item in items {
            let point = RawPayload::new(item);
            let text_value = match item {
                JsonValue::Object(obj) => point
                    .get("correct_label", "correctLabel")
                    .and_then(value_text)
                    .or_else(|| {
                        ["label", "text", "name"]
                            .iter()
                            .find_map(|k| obj.get(*k).and_then(value_text))
                    }),
                other => value_text(other),
            };
            let Some(correct_label) = text_value else { continue };
            labels.push(LabelPoint {
                id: format!("label_{}", labels.len()),
                x: point.number("x", "x"),
                y: point.number("y", "y"),
                correct_label,
            });
        }
    }
    if labels.is_empty() {
        issues.missing("labels", "no label points");
    }

    let mut label_bank = raw.string_list("label_bank", "labelBank");
    if label_bank.is_empty() {
        label_bank = labels.iter().map(|l| l.correct_label.clone()).collect();
        label_bank.extend(raw.option_texts());
    }
    dedup_keep_order(&mut label_bank);

    QuestionKind::DiagramLabeling(DiagramLabelingDetails {
        diagram,
        labels,
        label_bank,
        allow_partial_credit: raw
            .boolean("allow_partial_credit", "allowPartialCredit")
            .unwrap_or(true),
    })
}

fn open_ended(raw: &RawPayload<'_>) -> QuestionKind {
    let criteria = match raw.key("criteria").or_else(|| raw.key("rubric")) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                JsonValue::Object(obj) => {
                    let name = ["name", "criterion", "title"]
                        .iter()
                        .find_map(|k| obj.get(*k).and_then(value_text))?;
                    Some(RubricCriterion {
                        name,
                        description: obj.get("description").and_then(value_text).unwrap_or_default(),
                        points: obj.get("points").and_then(value_number).unwrap_or(0.0),
                    })
                }
                other => value_text(other).map(|name| RubricCriterion {
                    name,
                    description: String::new(),
                    points: 0.0,
                }),
            })
            .collect(),
        Some(other) => value_text(other)
            .map(|name| {
                vec![RubricCriterion {
                    name,
                    description: String::new(),
                    points: 0.0,
                }]
            })
            .unwrap_or_default(),
        None => Vec::new(),
    };

    QuestionKind::OpenEnded(OpenEndedDetails {
        criteria,
        sample_answer: raw
            .string("sample_answer", "sampleAnswer")
            .or_else(|| raw.correct_answer().and_then(value_text)),
    })
}
