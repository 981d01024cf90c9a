use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A canonical question: the shared base fields plus exactly one variant payload,
/// discriminated by the `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_points")]
    pub points: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default)]
    pub metadata: QuestionMetadata,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

fn default_points() -> f64 {
    10.0
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    /// Points clamped to a usable maximum score.
    pub fn max_score(&self) -> f64 {
        if self.points.is_finite() && self.points > 0.0 {
            self.points
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BloomLevel {
    Remember,
    #[default]
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl BloomLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remember" => Some(Self::Remember),
            "understand" => Some(Self::Understand),
            "apply" => Some(Self::Apply),
            "analyze" | "analyse" => Some(Self::Analyze),
            "evaluate" => Some(Self::Evaluate),
            "create" => Some(Self::Create),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionMetadata {
    #[serde(default)]
    pub blooms_level: BloomLevel,
    /// Seconds.
    #[serde(default)]
    pub estimated_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
}

/// The closed set of discriminant tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillBlank,
    Numeric,
    ShortAnswer,
    LongAnswer,
    Essay,
    Matching,
    Ordering,
    Classification,
    VisualIdentification,
    Counting,
    PatternRecognition,
    CodeCompletion,
    DiagramLabeling,
    OpenEnded,
}

impl QuestionType {
    pub const ALL: [QuestionType; 16] = [
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::FillBlank,
        QuestionType::Numeric,
        QuestionType::ShortAnswer,
        QuestionType::LongAnswer,
        QuestionType::Essay,
        QuestionType::Matching,
        QuestionType::Ordering,
        QuestionType::Classification,
        QuestionType::VisualIdentification,
        QuestionType::Counting,
        QuestionType::PatternRecognition,
        QuestionType::CodeCompletion,
        QuestionType::DiagramLabeling,
        QuestionType::OpenEnded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::FillBlank => "fill_blank",
            QuestionType::Numeric => "numeric",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::LongAnswer => "long_answer",
            QuestionType::Essay => "essay",
            QuestionType::Matching => "matching",
            QuestionType::Ordering => "ordering",
            QuestionType::Classification => "classification",
            QuestionType::VisualIdentification => "visual_identification",
            QuestionType::Counting => "counting",
            QuestionType::PatternRecognition => "pattern_recognition",
            QuestionType::CodeCompletion => "code_completion",
            QuestionType::DiagramLabeling => "diagram_labeling",
            QuestionType::OpenEnded => "open_ended",
        }
    }

    /// Free-form types that can only be graded by a person.
    pub fn requires_manual_review(self) -> bool {
        matches!(
            self,
            QuestionType::LongAnswer | QuestionType::Essay | QuestionType::OpenEnded
        )
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown question type: {0}")]
pub struct UnknownQuestionType(pub String);

impl FromStr for QuestionType {
    type Err = UnknownQuestionType;

    /// Exact tag match only; aliases and other casings are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownQuestionType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice(MultipleChoiceDetails),
    TrueFalse(TrueFalseDetails),
    FillBlank(FillBlankDetails),
    Numeric(NumericDetails),
    ShortAnswer(ShortAnswerDetails),
    LongAnswer(LongFormDetails),
    Essay(LongFormDetails),
    Matching(MatchingDetails),
    Ordering(OrderingDetails),
    Classification(ClassificationDetails),
    VisualIdentification(VisualIdentificationDetails),
    Counting(CountingDetails),
    PatternRecognition(PatternRecognitionDetails),
    CodeCompletion(CodeCompletionDetails),
    DiagramLabeling(DiagramLabelingDetails),
    OpenEnded(OpenEndedDetails),
}

impl QuestionKind {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionKind::MultipleChoice(_) => QuestionType::MultipleChoice,
            QuestionKind::TrueFalse(_) => QuestionType::TrueFalse,
            QuestionKind::FillBlank(_) => QuestionType::FillBlank,
            QuestionKind::Numeric(_) => QuestionType::Numeric,
            QuestionKind::ShortAnswer(_) => QuestionType::ShortAnswer,
            QuestionKind::LongAnswer(_) => QuestionType::LongAnswer,
            QuestionKind::Essay(_) => QuestionType::Essay,
            QuestionKind::Matching(_) => QuestionType::Matching,
            QuestionKind::Ordering(_) => QuestionType::Ordering,
            QuestionKind::Classification(_) => QuestionType::Classification,
            QuestionKind::VisualIdentification(_) => QuestionType::VisualIdentification,
            QuestionKind::Counting(_) => QuestionType::Counting,
            QuestionKind::PatternRecognition(_) => QuestionType::PatternRecognition,
            QuestionKind::CodeCompletion(_) => QuestionType::CodeCompletion,
            QuestionKind::DiagramLabeling(_) => QuestionType::DiagramLabeling,
            QuestionKind::OpenEnded(_) => QuestionType::OpenEnded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceDetails {
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub allow_multiple: bool,
}

impl MultipleChoiceDetails {
    pub fn correct_ids(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrueFalseDetails {
    pub statement: String,
    pub correct_answer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blank {
    pub id: String,
    pub correct_answers: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBlankDetails {
    pub template: String,
    pub blanks: Vec<Blank>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericDetails {
    pub correct_answer: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

pub const DEFAULT_TOLERANCE: f64 = 0.001;

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortAnswerDetails {
    #[serde(default)]
    pub acceptable_answers: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Shared by `long_answer` and `essay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LongFormDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_words: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_words: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchItem {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPair {
    pub left_id: String,
    pub right_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingDetails {
    pub left_items: Vec<MatchItem>,
    pub right_items: Vec<MatchItem>,
    pub correct_pairs: Vec<MatchPair>,
    #[serde(default = "default_true")]
    pub allow_partial_credit: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Sequence,
    Chronological,
    Numerical,
    Alphabetical,
    Size,
    Process,
}

impl OrderType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sequence" | "sequential" => Some(Self::Sequence),
            "chronological" => Some(Self::Chronological),
            "numerical" | "numeric" => Some(Self::Numerical),
            "alphabetical" => Some(Self::Alphabetical),
            "size" => Some(Self::Size),
            "process" => Some(Self::Process),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub text: String,
    /// 1-based.
    pub correct_position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderingDetails {
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default = "default_true")]
    pub allow_partial_credit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyItem {
    pub id: String,
    pub text: String,
    pub correct_category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationDetails {
    pub categories: Vec<Category>,
    pub items: Vec<ClassifyItem>,
    #[serde(default = "default_true")]
    pub allow_partial_credit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualIdentificationDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<String>,
    pub correct_count: u32,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecognitionDetails {
    pub sequence: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCompletionDetails {
    #[serde(default)]
    pub language: String,
    pub template: String,
    pub blanks: Vec<Blank>,
    #[serde(default = "default_true")]
    pub allow_partial_credit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPoint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    pub correct_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramLabelingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagram: Option<String>,
    pub labels: Vec<LabelPoint>,
    #[serde(default)]
    pub label_bank: Vec<String>,
    #[serde(default = "default_true")]
    pub allow_partial_credit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricCriterion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OpenEndedDetails {
    #[serde(default)]
    pub criteria: Vec<RubricCriterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_answer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_round_trips_through_from_str() {
        for t in QuestionType::ALL {
            assert_eq!(t.as_str().parse::<QuestionType>(), Ok(t));
        }
        assert!("Multiple_Choice".parse::<QuestionType>().is_err());
        assert!("mcq".parse::<QuestionType>().is_err());
    }

    #[test]
    fn serializes_flat_with_type_tag() {
        let q = Question {
            id: "q1".into(),
            content: "Is water wet?".into(),
            topic: String::new(),
            subject: String::new(),
            difficulty: Difficulty::Easy,
            points: 1.0,
            explanation: None,
            hints: vec![],
            metadata: QuestionMetadata::default(),
            kind: QuestionKind::TrueFalse(TrueFalseDetails {
                statement: "Water is wet".into(),
                correct_answer: true,
            }),
        };
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["type"], json!("true_false"));
        assert_eq!(v["correctAnswer"], json!(true));
        assert_eq!(v["metadata"]["bloomsLevel"], json!("understand"));

        let back: Question = serde_json::from_value(v).unwrap();
        assert_eq!(back, q);
    }
}
