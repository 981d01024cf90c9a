//! Infers a question's discriminant tag from a raw payload.
//!
//! Detection walks an ordered rule table and stops at the first rule that fires. The
//! table is data ([`DetectionRule`], [`DetectorPolicy::rule_order`]) so the precedence can
//! be inspected and tested on its own. The final rule always fires, so detection is total.

use crate::models::question::QuestionType;
use crate::models::report::ContentIssue;
use crate::utils::glyphs;
use crate::utils::raw::{value_text, RawPayload};
use crate::utils::text;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

const COUNTING_PHRASES: &[&str] = &["how many", "count", "counts", "counting", "total number of"];

const SELECTION_MARKERS: &[&str] = &[
    "which", "largest", "smallest", "best", "most", "least", "greatest", "fewest", "biggest",
    "highest", "lowest", "tallest", "shortest", "longest", "heaviest", "lightest", "compare",
];

const MATH_SUBJECTS: &[&str] = &["math", "maths", "mathematics", "arithmetic"];

const QUANTITATIVE_SUBJECTS: &[&str] = &[
    "physics",
    "chemistry",
    "statistics",
    "algebra",
    "geometry",
    "calculus",
    "science",
    "economics",
];

const EARLY_GRADES: &[&str] = &["pre-k", "prek", "k", "kindergarten", "0", "1", "2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionRule {
    /// Counting phrasing plus pictorial glyphs in the visual.
    CountingWithGlyphs,
    /// Counting phrasing plus all-numeric options; comparison wording turns it into a choice.
    CountingWithNumericOptions,
    /// A `type` tag from the closed set, taken verbatim.
    ExplicitTag,
    /// Early-grade math with a visual.
    EarlyGradeMathVisual,
    /// Three or more consecutive underscores in the prompt.
    BlankMarkers,
    /// Two options, one of them a truth value, or a boolean answer with no options.
    TruthValueOptions,
    OptionsPresent,
    /// Quantitative subject with a number for an answer.
    QuantitativeNumericAnswer,
    Fallback,
}

/// Rule precedence exactly as the content generator's payloads require it when the
/// explicit tag is not trusted first.
pub const LITERAL_RULE_ORDER: [DetectionRule; 9] = [
    DetectionRule::CountingWithGlyphs,
    DetectionRule::CountingWithNumericOptions,
    DetectionRule::ExplicitTag,
    DetectionRule::EarlyGradeMathVisual,
    DetectionRule::BlankMarkers,
    DetectionRule::TruthValueOptions,
    DetectionRule::OptionsPresent,
    DetectionRule::QuantitativeNumericAnswer,
    DetectionRule::Fallback,
];

/// Precedence of the explicit `type` tag.
///
/// [`LITERAL_RULE_ORDER`] lets counting phrasing plus glyphs or numeric options
/// override a tag, which can turn a tagged `multiple_choice` into `counting`. The
/// default hoists the tag so a valid tag always survives normalization; set
/// `explicit_tag_first: false` (`EXPLICIT_TYPE_FIRST=false`) for the literal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorPolicy {
    /// Hoist [`DetectionRule::ExplicitTag`] ahead of the counting rules.
    pub explicit_tag_first: bool,
}

impl Default for DetectorPolicy {
    fn default() -> Self {
        Self {
            explicit_tag_first: true,
        }
    }
}

impl DetectorPolicy {
    pub fn rule_order(&self) -> Vec<DetectionRule> {
        let mut order = LITERAL_RULE_ORDER.to_vec();
        if self.explicit_tag_first {
            order.retain(|r| *r != DetectionRule::ExplicitTag);
            order.insert(0, DetectionRule::ExplicitTag);
        }
        order
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub question_type: QuestionType,
    pub rule: DetectionRule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ContentIssue>,
}

/// The parts of a payload the rules look at.
struct Signals<'a> {
    prompt: String,
    explicit: Option<QuestionType>,
    options: Vec<String>,
    visual: Option<String>,
    subject: String,
    grade: Option<String>,
    correct_answer: Option<&'a JsonValue>,
}

impl<'a> Signals<'a> {
    fn read(raw: &RawPayload<'a>) -> Self {
        let mut prompt = raw.prompt().unwrap_or_default();
        if let Some(template) = raw.string("template", "template") {
            prompt.push(' ');
            prompt.push_str(&template);
        }
        Self {
            prompt,
            explicit: raw.explicit_type().and_then(|t| t.parse().ok()),
            options: raw.option_texts(),
            visual: raw.visual(),
            subject: raw
                .string("subject", "subject")
                .unwrap_or_default()
                .to_lowercase(),
            grade: raw.grade(),
            correct_answer: raw.correct_answer(),
        }
    }

    fn counting_phrasing(&self) -> bool {
        text::contains_any_phrase(&self.prompt, COUNTING_PHRASES)
    }

    fn selection_phrasing(&self) -> bool {
        text::contains_any_phrase(&self.prompt, SELECTION_MARKERS)
    }

    fn numeric_options(&self) -> bool {
        !self.options.is_empty()
            && self
                .options
                .iter()
                .all(|o| text::parse_number_strict(o).is_some())
    }

    fn visual_has_glyphs(&self) -> bool {
        self.visual.as_deref().is_some_and(glyphs::has_glyphs)
    }

    fn subject_in(&self, list: &[&str]) -> bool {
        text::words(&self.subject).iter().any(|w| list.contains(&w.as_str()))
    }

    fn early_grade(&self) -> bool {
        let Some(grade) = self.grade.as_deref() else {
            return false;
        };
        let lowered = grade.to_lowercase();
        let stripped = lowered
            .trim()
            .trim_start_matches("grade")
            .trim()
            .trim_end_matches(|c: char| c.is_alphabetic() && c != 'k');
        EARLY_GRADES.contains(&stripped)
    }

    fn answer_is_number(&self) -> bool {
        match self.correct_answer {
            Some(JsonValue::Number(_)) => true,
            Some(JsonValue::String(s)) => text::parse_number_strict(s).is_some(),
            _ => false,
        }
    }

    fn truth_options(&self) -> bool {
        const TRUTH_WORDS: &[&str] = &["true", "false", "yes", "no"];
        if self.options.is_empty() {
            return matches!(self.correct_answer, Some(JsonValue::Bool(_)));
        }
        self.options.len() == 2
            && self
                .options
                .iter()
                .any(|o| TRUTH_WORDS.contains(&o.trim().to_ascii_lowercase().as_str()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionService {
    policy: DetectorPolicy,
}

impl DetectionService {
    pub fn new(policy: DetectorPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DetectorPolicy {
        self.policy
    }

    pub fn detect(&self, raw: &JsonValue) -> Detection {
        let payload = RawPayload::new(raw);
        let signals = Signals::read(&payload);

        let mut issues = Vec::new();
        if let Some(tag) = payload.explicit_type() {
            if signals.explicit.is_none() {
                issues.push(ContentIssue::ambiguous(format!(
                    "unrecognized type tag `{}`, inferring from content",
                    tag
                )));
            }
        } else if let Some(v) = payload.key("type").and_then(value_text) {
            issues.push(ContentIssue::ambiguous(format!(
                "non-string type tag `{}` ignored",
                v
            )));
        }

        for rule in self.policy.rule_order() {
            if let Some(question_type) = apply_rule(rule, &signals) {
                if let Some(explicit) = signals.explicit {
                    if explicit != question_type {
                        issues.push(ContentIssue::ambiguous(format!(
                            "explicit type `{}` overridden by {:?} as `{}`",
                            explicit, rule, question_type
                        )));
                    }
                }
                tracing::debug!(?rule, %question_type, "question type detected");
                return Detection {
                    question_type,
                    rule,
                    issues,
                };
            }
        }

        Detection {
            question_type: QuestionType::ShortAnswer,
            rule: DetectionRule::Fallback,
            issues,
        }
    }
}

fn apply_rule(rule: DetectionRule, s: &Signals<'_>) -> Option<QuestionType> {
    match rule {
        DetectionRule::CountingWithGlyphs => {
            (s.counting_phrasing() && s.visual_has_glyphs()).then_some(QuestionType::Counting)
        }
        DetectionRule::CountingWithNumericOptions => {
            if !(s.counting_phrasing() && s.numeric_options()) {
                return None;
            }
            if s.selection_phrasing() {
                Some(QuestionType::MultipleChoice)
            } else {
                Some(QuestionType::Counting)
            }
        }
        DetectionRule::ExplicitTag => s.explicit,
        DetectionRule::EarlyGradeMathVisual => (s.subject_in(MATH_SUBJECTS)
            && s.early_grade()
            && s.visual.is_some())
        .then_some(QuestionType::Counting),
        DetectionRule::BlankMarkers => {
            text::has_blank_marker(&s.prompt).then_some(QuestionType::FillBlank)
        }
        DetectionRule::TruthValueOptions => s.truth_options().then_some(QuestionType::TrueFalse),
        DetectionRule::OptionsPresent => {
            (!s.options.is_empty()).then_some(QuestionType::MultipleChoice)
        }
        DetectionRule::QuantitativeNumericAnswer => ((s.subject_in(MATH_SUBJECTS)
            || s.subject_in(QUANTITATIVE_SUBJECTS))
            && s.answer_is_number())
        .then_some(QuestionType::Numeric),
        DetectionRule::Fallback => Some(QuestionType::ShortAnswer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detect(v: JsonValue) -> Detection {
        DetectionService::default().detect(&v)
    }

    fn literal(v: JsonValue) -> Detection {
        DetectionService::new(DetectorPolicy {
            explicit_tag_first: false,
        })
        .detect(&v)
    }

    #[test]
    fn counting_with_glyph_visual() {
        let d = detect(json!({"question": "How many stars? 🌟🌟🌟", "visual": "🌟🌟🌟"}));
        assert_eq!(d.question_type, QuestionType::Counting);
        assert_eq!(d.rule, DetectionRule::CountingWithGlyphs);
    }

    #[test]
    fn numeric_options_with_comparison_stay_multiple_choice() {
        let d = detect(json!({
            "question": "How many apples does the largest basket hold? Which is it?",
            "options": ["3", "5", "7"]
        }));
        assert_eq!(d.question_type, QuestionType::MultipleChoice);
        assert_eq!(d.rule, DetectionRule::CountingWithNumericOptions);

        let d = detect(json!({"question": "Count the ducks", "options": ["2", "3", "4"]}));
        assert_eq!(d.question_type, QuestionType::Counting);
    }

    #[test]
    fn explicit_tag_is_trusted_verbatim() {
        for t in QuestionType::ALL {
            let d = detect(json!({"type": t.as_str(), "question": "How many? 🌟", "visual": "🌟"}));
            assert_eq!(d.question_type, t);
            assert_eq!(d.rule, DetectionRule::ExplicitTag);
        }
    }

    #[test]
    fn literal_order_lets_counting_override_tag() {
        let d = literal(json!({
            "type": "multiple_choice",
            "question": "How many stars?",
            "visual": "⭐⭐",
            "options": ["1", "2"]
        }));
        assert_eq!(d.question_type, QuestionType::Counting);
        assert!(matches!(d.issues[0], ContentIssue::AmbiguousType { .. }));
    }

    #[test]
    fn unknown_tag_falls_through_with_issue() {
        let d = detect(json!({"type": "MCQ", "question": "Pick one", "options": ["a", "b", "c"]}));
        assert_eq!(d.question_type, QuestionType::MultipleChoice);
        assert_eq!(d.issues.len(), 1);
    }

    #[test]
    fn early_grade_math_with_visual() {
        let d = detect(json!({
            "question": "Look at the picture",
            "subject": "Math",
            "grade": "K",
            "visual": "three ducks"
        }));
        assert_eq!(d.question_type, QuestionType::Counting);
        assert_eq!(d.rule, DetectionRule::EarlyGradeMathVisual);
    }

    #[test]
    fn heuristics_in_order() {
        assert_eq!(
            detect(json!({"question": "The ___ runs fast."})).question_type,
            QuestionType::FillBlank
        );
        assert_eq!(
            detect(json!({"question": "The sky is green", "options": ["True", "False"]}))
                .question_type,
            QuestionType::TrueFalse
        );
        assert_eq!(
            detect(json!({"question": "Pick", "options": ["red", "blue"]})).question_type,
            QuestionType::MultipleChoice
        );
        assert_eq!(
            detect(json!({"question": "What is 6 x 7?", "subject": "math", "correct_answer": "42"}))
                .question_type,
            QuestionType::Numeric
        );
        assert_eq!(
            detect(json!({"question": "Capital of France?", "subject": "geography", "correct_answer": "Paris"}))
                .question_type,
            QuestionType::ShortAnswer
        );
        assert_eq!(detect(json!({})).rule, DetectionRule::Fallback);
    }

    #[test]
    fn rule_order_hoists_explicit_tag() {
        let order = DetectorPolicy::default().rule_order();
        assert_eq!(order[0], DetectionRule::ExplicitTag);
        assert_eq!(order.len(), LITERAL_RULE_ORDER.len());
        let literal = DetectorPolicy {
            explicit_tag_first: false,
        }
        .rule_order();
        assert_eq!(literal, LITERAL_RULE_ORDER.to_vec());
    }
}
