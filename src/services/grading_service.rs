use crate::models::answer::{AnswerResult, AssessmentResult, ItemOutcome, PartialCredit};
use crate::models::question::{
    Blank, ClassificationDetails, CountingDetails, DiagramLabelingDetails, LongFormDetails,
    MatchingDetails, MultipleChoiceDetails, NumericDetails, OpenEndedDetails, OrderingDetails,
    Question, QuestionKind, QuestionType, ShortAnswerDetails, TrueFalseDetails,
};
use crate::models::report::ContentIssue;
use crate::services::validation_service::ValidationService;
use crate::utils::raw::value_text;
use crate::utils::text;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Object keys that merely wrap the real answer, e.g. `{"selected": 2}`.
const ANSWER_WRAPPERS: &[&str] = &["answer", "selected", "value", "response"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingSettings {
    /// Share of the points awarded for submitting a free-form answer.
    pub participation_share: f64,
    pub multiple_choice_partial_factor: f64,
    pub short_answer_keyword_factor: f64,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            participation_share: 0.1,
            multiple_choice_partial_factor: 0.5,
            short_answer_keyword_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradingService {
    settings: GradingSettings,
    validator: ValidationService,
}

impl GradingService {
    pub fn new(settings: GradingSettings) -> Self {
        Self {
            settings,
            validator: ValidationService::new(),
        }
    }

    pub fn settings(&self) -> &GradingSettings {
        &self.settings
    }

    /// Grades one answer. Never fails: unreadable answers and broken questions come
    /// back as `is_valid: false` with a score of zero.
    pub fn grade(&self, question: &Question, answer: &JsonValue) -> AnswerResult {
        let ty = question.question_type();
        let max = question.max_score();

        let report = self.validator.validate(question);
        if !report.is_valid {
            tracing::warn!(id = %question.id, errors = ?report.errors, "grading a malformed question");
            return AnswerResult::invalid(ty, max, "Question is not well-formed", report.errors);
        }

        let answer = unwrap_answer(question, answer);
        let empty_selection = matches!(question.kind, QuestionKind::MultipleChoice(_))
            && answer.as_array().is_some_and(Vec::is_empty);
        if is_absent(answer) && !empty_selection {
            return AnswerResult::invalid(ty, max, "No answer submitted", Vec::new());
        }

        let result = match &question.kind {
            QuestionKind::MultipleChoice(mc) => self.multiple_choice(mc, answer, ty, max),
            QuestionKind::TrueFalse(tf) => true_false(tf, answer, ty, max),
            QuestionKind::FillBlank(fb) => grade_blanks(&fb.blanks, answer, true, ty, max),
            QuestionKind::Numeric(n) => numeric(n, answer, ty, max),
            QuestionKind::ShortAnswer(sa) => self.short_answer(sa, answer, ty, max),
            QuestionKind::LongAnswer(lf) | QuestionKind::Essay(lf) => {
                self.long_form(lf, answer, ty, max)
            }
            QuestionKind::Matching(m) => matching(m, answer, ty, max),
            QuestionKind::Ordering(o) => ordering(o, answer, ty, max),
            QuestionKind::Classification(c) => classification(c, answer, ty, max),
            QuestionKind::VisualIdentification(v) => {
                pick_one(&v.options, &v.correct_answer, answer, ty, max)
            }
            QuestionKind::Counting(c) => counting(c, answer, ty, max),
            QuestionKind::PatternRecognition(p) => {
                pick_one(&p.options, &p.correct_answer, answer, ty, max)
            }
            QuestionKind::CodeCompletion(cc) => {
                grade_blanks(&cc.blanks, answer, cc.allow_partial_credit, ty, max)
            }
            QuestionKind::DiagramLabeling(d) => diagram_labeling(d, answer, ty, max),
            QuestionKind::OpenEnded(oe) => self.open_ended(oe, answer, ty, max),
        };

        tracing::debug!(
            id = %question.id,
            question_type = %ty,
            score = result.score,
            valid = result.is_valid,
            "graded answer"
        );
        result
    }

    /// Grades every question; a question with no entry in `answers` is graded against
    /// an absent answer rather than skipped.
    pub fn grade_assessment(
        &self,
        questions: &[Question],
        answers: &HashMap<String, JsonValue>,
        passing_score: Option<f64>,
    ) -> AssessmentResult {
        let mut total_score = 0.0;
        let mut max_score = 0.0;
        let mut requires_manual_review = false;
        let mut results = BTreeMap::new();

        for question in questions {
            if results.contains_key(&question.id) {
                tracing::warn!(id = %question.id, "duplicate question id skipped");
                continue;
            }
            let answer = answers.get(&question.id).unwrap_or(&JsonValue::Null);
            let result = self.grade(question, answer);
            total_score += result.score;
            max_score += result.max_score;
            requires_manual_review |= result.requires_manual_review;
            results.insert(question.id.clone(), result);
        }

        let percentage = if max_score > 0.0 {
            (total_score / max_score * 10_000.0).round() / 100.0
        } else {
            0.0
        };
        let passed = passing_score.map(|p| percentage >= p);

        tracing::info!(
            questions = questions.len(),
            total_score,
            max_score,
            percentage,
            "assessment graded"
        );

        AssessmentResult {
            total_score,
            max_score,
            percentage,
            passed,
            requires_manual_review,
            results,
        }
    }

    fn multiple_choice(
        &self,
        mc: &MultipleChoiceDetails,
        answer: &JsonValue,
        ty: QuestionType,
        max: f64,
    ) -> AnswerResult {
        let given: Vec<&JsonValue> = match answer {
            JsonValue::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        let mut selected: HashSet<&str> = HashSet::new();
        for g in given {
            match selected_option(mc, g) {
                Some(id) => {
                    selected.insert(id);
                }
                None => return malformed(ty, max, format!("{} is not one of the options", g)),
            }
        }
        if !mc.allow_multiple && selected.len() > 1 {
            return malformed(ty, max, "only one option may be selected".to_string());
        }

        let correct: HashSet<&str> = mc.correct_ids().into_iter().collect();
        let hits = selected.intersection(&correct).count();
        let correct_text = mc
            .options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.text.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let partial = mc.allow_multiple.then(|| {
            PartialCredit::from_items(
                mc.options
                    .iter()
                    .filter(|o| o.is_correct)
                    .map(|o| ItemOutcome {
                        id: o.id.clone(),
                        correct: selected.contains(o.id.as_str()),
                        expected: Some(o.text.clone()),
                        given: None,
                    })
                    .collect(),
            )
        });

        let result = if selected == correct {
            AnswerResult::graded(ty, true, max, max, "Correct!")
        } else if mc.allow_multiple && hits > 0 {
            let share = hits as f64 / correct.len() as f64;
            AnswerResult::graded(
                ty,
                false,
                share * self.settings.multiple_choice_partial_factor * max,
                max,
                format!(
                    "Partially correct: {} of {} correct options selected. The correct answers are {}.",
                    hits,
                    correct.len(),
                    correct_text
                ),
            )
        } else {
            AnswerResult::graded(
                ty,
                false,
                0.0,
                max,
                format!("Incorrect. The correct answer is {}.", correct_text),
            )
        };
        match partial {
            Some(p) => result.with_partial_credit(p),
            None => result,
        }
    }

    fn short_answer(
        &self,
        sa: &ShortAnswerDetails,
        answer: &JsonValue,
        ty: QuestionType,
        max: f64,
    ) -> AnswerResult {
        let Some(given) = scalar_text(answer) else {
            return malformed(ty, max, "expected a text answer".to_string());
        };
        let normalized = text::normalize_answer(&given, sa.case_sensitive);
        if sa
            .acceptable_answers
            .iter()
            .any(|a| text::normalize_answer(a, sa.case_sensitive) == normalized)
        {
            return AnswerResult::graded(ty, true, max, max, "Correct!");
        }

        if sa.keywords.is_empty() {
            let expected = sa.acceptable_answers.first().cloned().unwrap_or_default();
            return AnswerResult::graded(
                ty,
                false,
                0.0,
                max,
                format!("Incorrect. Expected: {}.", expected),
            );
        }

        let items: Vec<ItemOutcome> = sa
            .keywords
            .iter()
            .map(|k| ItemOutcome {
                id: k.clone(),
                correct: text::contains_phrase(&given, k),
                expected: None,
                given: None,
            })
            .collect();
        let partial = PartialCredit::from_items(items);
        let score = partial.ratio() * self.settings.short_answer_keyword_factor * max;
        AnswerResult::graded(
            ty,
            false,
            score,
            max,
            format!(
                "Not an exact match; {} of {} key ideas mentioned.",
                partial.earned, partial.possible
            ),
        )
        .with_partial_credit(partial)
    }

    fn participation(&self, ty: QuestionType, max: f64, feedback: String) -> AnswerResult {
        tracing::debug!(question_type = %ty, issue = %ContentIssue::ManualReviewRequired, "participation credit");
        AnswerResult::pending_review(ty, self.settings.participation_share * max, max, feedback)
    }

    fn long_form(
        &self,
        lf: &LongFormDetails,
        answer: &JsonValue,
        ty: QuestionType,
        max: f64,
    ) -> AnswerResult {
        let Some(given) = scalar_text(answer) else {
            return malformed(ty, max, "expected a written response".to_string());
        };
        let words = text::word_count(&given);
        let mut feedback = format!("Response received ({} words) and queued for review.", words);
        if let Some(min) = lf.min_words.filter(|m| words < *m as usize) {
            feedback.push_str(&format!(" Shorter than the expected {} words.", min));
        }
        if let Some(max_words) = lf.max_words.filter(|m| words > *m as usize) {
            feedback.push_str(&format!(" Longer than the {} word limit.", max_words));
        }
        self.participation(ty, max, feedback)
    }

    fn open_ended(
        &self,
        oe: &OpenEndedDetails,
        answer: &JsonValue,
        ty: QuestionType,
        max: f64,
    ) -> AnswerResult {
        if scalar_text(answer).is_none() {
            return malformed(ty, max, "expected a written response".to_string());
        }
        let feedback = if oe.criteria.is_empty() {
            "Response received and queued for review.".to_string()
        } else {
            let names: Vec<&str> = oe.criteria.iter().map(|c| c.name.as_str()).collect();
            format!(
                "Response received and queued for review against: {}.",
                names.join(", ")
            )
        };
        self.participation(ty, max, feedback)
    }
}

fn unwrap_answer<'a>(question: &Question, answer: &'a JsonValue) -> &'a JsonValue {
    let single = answer
        .as_object()
        .filter(|obj| obj.len() == 1)
        .and_then(|obj| obj.iter().next());
    match single {
        Some((key, inner))
            if ANSWER_WRAPPERS.contains(&key.as_str()) && !names_an_entry(question, key) =>
        {
            inner
        }
        _ => answer,
    }
}

/// Whether `key` addresses an entry of a question graded from a keyed map.
fn names_an_entry(question: &Question, key: &str) -> bool {
    let hit = |id: &str, label: &str| id == key || text::eq_loose(label, key);
    match &question.kind {
        QuestionKind::Matching(m) => m.left_items.iter().any(|i| hit(&i.id, &i.text)),
        QuestionKind::Classification(c) => c.items.iter().any(|i| hit(&i.id, &i.text)),
        QuestionKind::Ordering(o) => o.items.iter().any(|i| hit(&i.id, &i.text)),
        QuestionKind::FillBlank(fb) => fb.blanks.iter().any(|b| b.id == key),
        QuestionKind::CodeCompletion(cc) => cc.blanks.iter().any(|b| b.id == key),
        QuestionKind::DiagramLabeling(d) => d.labels.iter().any(|l| l.id == key),
        _ => false,
    }
}

fn is_absent(answer: &JsonValue) -> bool {
    match answer {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Object(obj) => obj.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn malformed(ty: QuestionType, max: f64, detail: String) -> AnswerResult {
    tracing::warn!(question_type = %ty, detail = %detail, "rejected answer");
    let issue = ContentIssue::malformed(detail.clone());
    AnswerResult::invalid(
        ty,
        max,
        format!("Could not read the answer: {}.", detail),
        vec![issue.to_string()],
    )
}

/// Text of a string, number or boolean answer.
fn scalar_text(answer: &JsonValue) -> Option<String> {
    match answer {
        JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_) => value_text(answer),
        _ => None,
    }
}

/// Scores a list of per-item outcomes as a share of the points, or all-or-nothing.
fn itemized(
    items: Vec<ItemOutcome>,
    allow_partial: bool,
    noun: &str,
    ty: QuestionType,
    max: f64,
) -> AnswerResult {
    let partial = PartialCredit::from_items(items);
    let all = partial.possible > 0 && partial.earned == partial.possible;
    let (score, feedback) = if all {
        (max, "Correct!".to_string())
    } else {
        let share = if allow_partial { partial.ratio() * max } else { 0.0 };
        (
            share,
            format!("{} of {} {} correct.", partial.earned, partial.possible, noun),
        )
    };
    AnswerResult::graded(ty, all, score, max, feedback).with_partial_credit(partial)
}

fn selected_option<'a>(mc: &'a MultipleChoiceDetails, given: &JsonValue) -> Option<&'a str> {
    let by_number = |n: f64| {
        mc.options
            .iter()
            .find(|o| text::parse_number_strict(&o.text) == Some(n))
            .or_else(|| {
                (n.fract() == 0.0 && n >= 0.0)
                    .then(|| mc.options.get(n as usize))
                    .flatten()
            })
    };
    let option = match given {
        JsonValue::String(s) => {
            let s = s.trim();
            mc.options
                .iter()
                .find(|o| o.id == s)
                .or_else(|| mc.options.iter().find(|o| text::eq_loose(&o.text, s)))
                .or_else(|| text::parse_number_strict(s).and_then(by_number))
                .or_else(|| text::option_letter_index(s).and_then(|i| mc.options.get(i)))
        }
        JsonValue::Number(n) => n.as_f64().and_then(by_number),
        JsonValue::Object(obj) => {
            return ["id", "optionId", "option_id", "index", "text"]
                .iter()
                .find_map(|k| obj.get(*k))
                .and_then(|v| selected_option(mc, v));
        }
        _ => None,
    };
    option.map(|o| o.id.as_str())
}

fn true_false(tf: &TrueFalseDetails, answer: &JsonValue, ty: QuestionType, max: f64) -> AnswerResult {
    let given = match answer {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => text::truth_value(s),
        JsonValue::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    };
    let Some(given) = given else {
        return malformed(ty, max, format!("{} is not true or false", answer));
    };
    if given == tf.correct_answer {
        AnswerResult::graded(ty, true, max, max, "Correct!")
    } else {
        AnswerResult::graded(
            ty,
            false,
            0.0,
            max,
            format!("Incorrect. The statement is {}.", tf.correct_answer),
        )
    }
}

fn numeric(n: &NumericDetails, answer: &JsonValue, ty: QuestionType, max: f64) -> AnswerResult {
    let given = match answer {
        JsonValue::Number(v) => v.as_f64(),
        JsonValue::String(s) => text::parse_number_permissive(s),
        _ => None,
    };
    let Some(given) = given.filter(|g| g.is_finite()) else {
        return malformed(ty, max, format!("{} is not a number", answer));
    };
    let unit = n.unit.as_deref().map(|u| format!(" {}", u)).unwrap_or_default();
    if (given - n.correct_answer).abs() <= n.tolerance {
        AnswerResult::graded(ty, true, max, max, "Correct!")
    } else {
        AnswerResult::graded(
            ty,
            false,
            0.0,
            max,
            format!("Incorrect. The answer is {}{}.", n.correct_answer, unit),
        )
    }
}

/// Shared by fill-in-the-blank and code completion. Accepts a `{blankId: answer}` map,
/// a positional list, or a single value for the first blank.
fn grade_blanks(
    blanks: &[Blank],
    answer: &JsonValue,
    allow_partial: bool,
    ty: QuestionType,
    max: f64,
) -> AnswerResult {
    let given: Vec<Option<String>> = match answer {
        JsonValue::Object(map) => blanks
            .iter()
            .map(|b| map.get(&b.id).and_then(value_text))
            .collect(),
        JsonValue::Array(items) => (0..blanks.len())
            .map(|i| items.get(i).and_then(value_text))
            .collect(),
        other => match scalar_text(other) {
            Some(t) => std::iter::once(Some(t))
                .chain(std::iter::repeat(None))
                .take(blanks.len())
                .collect(),
            None => return malformed(ty, max, "expected text for each blank".to_string()),
        },
    };

    let items = blanks
        .iter()
        .zip(given)
        .map(|(blank, given)| {
            let correct = given.as_deref().is_some_and(|g| {
                let g = text::normalize_answer(g, blank.case_sensitive);
                blank
                    .correct_answers
                    .iter()
                    .any(|a| text::normalize_answer(a, blank.case_sensitive) == g)
            });
            ItemOutcome {
                id: blank.id.clone(),
                correct,
                expected: blank.correct_answers.first().cloned(),
                given,
            }
        })
        .collect();
    itemized(items, allow_partial, "blanks", ty, max)
}

/// Reads `{left: right}` maps and `[{leftId, rightId}]` / `[[left, right]]` lists as
/// (key, value) text pairs.
fn pairs_of(answer: &JsonValue, left_keys: &[&str], right_keys: &[&str]) -> Option<Vec<(String, String)>> {
    match answer {
        JsonValue::Object(map) => Some(
            map.iter()
                .filter_map(|(k, v)| value_text(v).map(|v| (k.clone(), v)))
                .collect(),
        ),
        JsonValue::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    JsonValue::Array(ends) if ends.len() == 2 => {
                        Some((value_text(&ends[0])?, value_text(&ends[1])?))
                    }
                    JsonValue::Object(obj) => {
                        let l = left_keys.iter().find_map(|k| obj.get(*k).and_then(value_text))?;
                        let r = right_keys.iter().find_map(|k| obj.get(*k).and_then(value_text))?;
                        Some((l, r))
                    }
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Id of the entry whose id or text equals `reference`.
fn find_id<'a, I>(entries: I, reference: &str) -> Option<&'a str>
where
    I: Iterator<Item = (&'a str, &'a str)> + Clone,
{
    let reference = reference.trim();
    entries
        .clone()
        .find(|(id, _)| *id == reference)
        .or_else(|| entries.clone().find(|(_, t)| text::eq_loose(t, reference)))
        .map(|(id, _)| id)
}

fn matching(m: &MatchingDetails, answer: &JsonValue, ty: QuestionType, max: f64) -> AnswerResult {
    let Some(pairs) = pairs_of(answer, &["leftId", "left_id", "left"], &["rightId", "right_id", "right"]) else {
        return malformed(ty, max, "expected pairs of left and right items".to_string());
    };
    let lefts = || m.left_items.iter().map(|i| (i.id.as_str(), i.text.as_str()));
    let rights = || m.right_items.iter().map(|i| (i.id.as_str(), i.text.as_str()));

    let mut chosen: HashMap<&str, &str> = HashMap::new();
    for (l, r) in &pairs {
        if let (Some(l), Some(r)) = (find_id(lefts(), l), find_id(rights(), r)) {
            chosen.entry(l).or_insert(r);
        }
    }

    let items = m
        .left_items
        .iter()
        .map(|left| {
            let expected = m
                .correct_pairs
                .iter()
                .find(|p| p.left_id == left.id)
                .map(|p| p.right_id.as_str());
            let given = chosen.get(left.id.as_str()).copied();
            ItemOutcome {
                id: left.id.clone(),
                correct: given.is_some() && given == expected,
                expected: expected.map(str::to_string),
                given: given.map(str::to_string),
            }
        })
        .collect();
    itemized(items, m.allow_partial_credit, "pairs", ty, max)
}

fn ordering(o: &OrderingDetails, answer: &JsonValue, ty: QuestionType, max: f64) -> AnswerResult {
    let entries = || o.items.iter().map(|i| (i.id.as_str(), i.text.as_str()));
    let mut positions: HashMap<&str, usize> = HashMap::new();

    match answer {
        JsonValue::Array(order) => {
            // Unknown entries take no slot, so they do not shift the rest.
            for entry in order {
                let id = match entry {
                    JsonValue::Object(obj) => obj.get("id").and_then(value_text),
                    other => value_text(other),
                }
                .and_then(|r| find_id(entries(), &r));
                if let Some(id) = id {
                    let next = positions.len() + 1;
                    positions.entry(id).or_insert(next);
                }
            }
        }
        JsonValue::Object(map) => {
            for (k, v) in map {
                let pos = v.as_u64().map(|p| p as usize).or_else(|| {
                    v.as_str()
                        .and_then(text::parse_number_strict)
                        .map(|p| p as usize)
                });
                if let (Some(id), Some(pos)) = (find_id(entries(), k), pos) {
                    positions.insert(id, pos);
                }
            }
        }
        _ => return malformed(ty, max, "expected the items in order".to_string()),
    }
    if positions.is_empty() {
        return malformed(ty, max, "none of the submitted entries are items".to_string());
    }

    let items = o
        .items
        .iter()
        .map(|item| {
            let given = positions.get(item.id.as_str()).copied();
            ItemOutcome {
                id: item.id.clone(),
                correct: given == Some(item.correct_position),
                expected: Some(item.correct_position.to_string()),
                given: given.map(|p| p.to_string()),
            }
        })
        .collect();
    itemized(items, o.allow_partial_credit, "items", ty, max)
}

fn classification(
    c: &ClassificationDetails,
    answer: &JsonValue,
    ty: QuestionType,
    max: f64,
) -> AnswerResult {
    let Some(pairs) = pairs_of(
        answer,
        &["itemId", "item_id", "item"],
        &["categoryId", "category_id", "category"],
    ) else {
        return malformed(ty, max, "expected a category for each item".to_string());
    };
    let items_by = || c.items.iter().map(|i| (i.id.as_str(), i.text.as_str()));
    let cats_by = || c.categories.iter().map(|cat| (cat.id.as_str(), cat.name.as_str()));

    let mut chosen: HashMap<&str, &str> = HashMap::new();
    for (item, cat) in &pairs {
        if let (Some(i), Some(cat)) = (find_id(items_by(), item), find_id(cats_by(), cat)) {
            chosen.entry(i).or_insert(cat);
        }
    }

    let items = c
        .items
        .iter()
        .map(|item| {
            let given = chosen.get(item.id.as_str()).copied();
            ItemOutcome {
                id: item.id.clone(),
                correct: given == Some(item.correct_category.as_str()),
                expected: Some(item.correct_category.clone()),
                given: given.map(str::to_string),
            }
        })
        .collect();
    itemized(items, c.allow_partial_credit, "items", ty, max)
}

fn diagram_labeling(
    d: &DiagramLabelingDetails,
    answer: &JsonValue,
    ty: QuestionType,
    max: f64,
) -> AnswerResult {
    let given: Vec<Option<String>> = match answer {
        JsonValue::Object(map) => d
            .labels
            .iter()
            .map(|l| map.get(&l.id).and_then(value_text))
            .collect(),
        JsonValue::Array(items) => (0..d.labels.len())
            .map(|i| items.get(i).and_then(value_text))
            .collect(),
        other => match scalar_text(other) {
            Some(t) => std::iter::once(Some(t))
                .chain(std::iter::repeat(None))
                .take(d.labels.len())
                .collect(),
            None => return malformed(ty, max, "expected a label for each point".to_string()),
        },
    };

    let items = d
        .labels
        .iter()
        .zip(given)
        .map(|(label, given)| ItemOutcome {
            id: label.id.clone(),
            correct: given
                .as_deref()
                .is_some_and(|g| text::eq_loose(g, &label.correct_label)),
            expected: Some(label.correct_label.clone()),
            given,
        })
        .collect();
    itemized(items, d.allow_partial_credit, "labels", ty, max)
}

/// Single pick among text options, by text or by position.
fn pick_one(
    options: &[String],
    correct: &str,
    answer: &JsonValue,
    ty: QuestionType,
    max: f64,
) -> AnswerResult {
    let given = match answer {
        JsonValue::Number(n) => n
            .as_u64()
            .and_then(|i| options.get(i as usize).cloned())
            .or_else(|| value_text(answer)),
        JsonValue::String(s) => {
            let s = s.trim();
            if options.iter().any(|o| text::eq_loose(o, s)) || options.is_empty() {
                Some(s.to_string())
            } else {
                text::option_letter_index(s)
                    .and_then(|i| options.get(i).cloned())
                    .or_else(|| Some(s.to_string()))
            }
        }
        _ => None,
    };
    let Some(given) = given else {
        return malformed(ty, max, "expected one of the options".to_string());
    };
    if text::eq_loose(&given, correct) {
        AnswerResult::graded(ty, true, max, max, "Correct!")
    } else {
        AnswerResult::graded(
            ty,
            false,
            0.0,
            max,
            format!("Incorrect. The answer is {}.", correct),
        )
    }
}

fn counting(c: &CountingDetails, answer: &JsonValue, ty: QuestionType, max: f64) -> AnswerResult {
    let given = match answer {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => text::parse_number_permissive(s),
        _ => None,
    };
    let Some(given) = given else {
        return malformed(ty, max, format!("{} is not a count", answer));
    };
    if given == c.correct_count as f64 {
        AnswerResult::graded(ty, true, max, max, "Correct!")
    } else {
        AnswerResult::graded(
            ty,
            false,
            0.0,
            max,
            format!("Not quite. There are {}.", c.correct_count),
        )
    }
}
