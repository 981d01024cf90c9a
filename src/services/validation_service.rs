use crate::models::question::{
    Blank, ClassificationDetails, CountingDetails, DiagramLabelingDetails, LongFormDetails,
    MatchingDetails, MultipleChoiceDetails, OrderingDetails, PatternRecognitionDetails, Question,
    QuestionKind, VisualIdentificationDetails,
};
use crate::models::report::ValidationReport;
use crate::utils::text;
use std::collections::{HashMap, HashSet};

/// Structural checks on canonical questions, independent of detection and normalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationService;

impl ValidationService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, question: &Question) -> ValidationReport {
        let mut report = ValidationReport::default();
        check_base(question, &mut report);

        match &question.kind {
            QuestionKind::MultipleChoice(mc) => check_multiple_choice(mc, &mut report),
            QuestionKind::TrueFalse(tf) => {
                if tf.statement.trim().is_empty() {
                    report.error("true/false statement is empty");
                }
            }
            QuestionKind::FillBlank(fb) => check_blanks(&fb.template, &fb.blanks, &mut report),
            QuestionKind::Numeric(n) => {
                if !n.correct_answer.is_finite() {
                    report.error("numeric correct answer is not a finite number");
                }
                if !n.tolerance.is_finite() || n.tolerance < 0.0 {
                    report.error("numeric tolerance must be a non-negative number");
                }
            }
            QuestionKind::ShortAnswer(sa) => {
                if sa.acceptable_answers.is_empty() && sa.keywords.is_empty() {
                    report.error("short answer has neither acceptable answers nor keywords");
                }
                if sa.acceptable_answers.iter().any(|a| a.trim().is_empty()) {
                    report.warn("short answer lists an empty acceptable answer");
                }
            }
            QuestionKind::LongAnswer(lf) | QuestionKind::Essay(lf) => check_long_form(lf, &mut report),
            QuestionKind::Matching(m) => check_matching(m, &mut report),
            QuestionKind::Ordering(o) => check_ordering(o, &mut report),
            QuestionKind::Classification(c) => check_classification(c, &mut report),
            QuestionKind::VisualIdentification(v) => check_visual_identification(v, &mut report),
            QuestionKind::Counting(c) => check_counting(c, &mut report),
            QuestionKind::PatternRecognition(p) => check_pattern(p, &mut report),
            QuestionKind::CodeCompletion(cc) => {
                if cc.language.trim().is_empty() {
                    report.warn("code completion has no language");
                }
                check_blanks(&cc.template, &cc.blanks, &mut report);
            }
            QuestionKind::DiagramLabeling(d) => check_diagram(d, &mut report),
            QuestionKind::OpenEnded(oe) => {
                if oe.criteria.is_empty() {
                    report.warn("open-ended question has no rubric criteria");
                }
                if oe.criteria.iter().any(|c| !c.points.is_finite() || c.points < 0.0) {
                    report.error("rubric criterion points must be non-negative");
                }
            }
        }

        let report = report.finish();
        if !report.is_valid {
            tracing::debug!(
                id = %question.id,
                question_type = %question.question_type(),
                errors = ?report.errors,
                "question failed validation"
            );
        }
        report
    }
}

fn check_base(q: &Question, report: &mut ValidationReport) {
    if q.id.trim().is_empty() {
        report.error("id is empty");
    }
    if q.content.trim().is_empty() {
        report.error("content is empty");
    }
    if !q.points.is_finite() || q.points < 0.0 {
        report.error(format!("points must be a non-negative number, got {}", q.points));
    } else if q.points == 0.0 {
        report.warn("question is worth zero points");
    }
    if q.metadata.estimated_time == 0 {
        report.warn("estimated time is zero");
    }
}

/// Records every id that appears more than once.
fn check_unique_ids<'a>(what: &str, ids: impl Iterator<Item = &'a str>, report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            report.error(format!("{} has an empty id", what));
        } else if !seen.insert(id) {
            report.error(format!("duplicate {} id `{}`", what, id));
        }
    }
}

fn check_multiple_choice(mc: &MultipleChoiceDetails, report: &mut ValidationReport) {
    if mc.options.len() < 2 {
        report.error(format!(
            "multiple choice needs at least 2 options, has {}",
            mc.options.len()
        ));
    }
    check_unique_ids("option", mc.options.iter().map(|o| o.id.as_str()), report);

    let correct = mc.options.iter().filter(|o| o.is_correct).count();
    if correct == 0 {
        report.error("no option is marked correct");
    } else if !mc.allow_multiple && correct > 1 {
        report.error(format!(
            "{} options marked correct but multiple answers are not allowed",
            correct
        ));
    }

    if mc.options.iter().any(|o| o.text.trim().is_empty()) {
        report.warn("an option has empty text");
    }
    let mut texts = HashSet::new();
    if !mc
        .options
        .iter()
        .all(|o| texts.insert(text::normalize_answer(&o.text, false)))
    {
        report.warn("options repeat the same text");
    }
}

fn check_blanks(template: &str, blanks: &[Blank], report: &mut ValidationReport) {
    if template.trim().is_empty() {
        report.error("template is empty");
    }
    if blanks.is_empty() {
        report.error("at least one blank is required");
    }
    check_unique_ids("blank", blanks.iter().map(|b| b.id.as_str()), report);

    let referenced: HashSet<String> = text::placeholders(template).into_iter().collect();
    for blank in blanks {
        if !referenced.contains(&blank.id) {
            report.error(format!("template does not reference blank `{}`", blank.id));
        }
        if blank.correct_answers.iter().all(|a| a.trim().is_empty()) {
            report.error(format!("blank `{}` has no accepted answer", blank.id));
        }
    }
    let spans = text::placeholder_spans(template);
    let loose_markers = text::blank_markers(template)
        .into_iter()
        .filter(|m| !spans.iter().any(|(p, _)| p.start < m.end && m.start < p.end))
        .count();
    if loose_markers > 0 {
        report.warn(format!("template has {} unreplaced blank marker(s)", loose_markers));
    }
    let known: HashSet<&str> = blanks.iter().map(|b| b.id.as_str()).collect();
    for id in &referenced {
        if !known.contains(id.as_str()) {
            report.warn(format!("template placeholder `{}` has no blank", id));
        }
    }
}

fn check_long_form(lf: &LongFormDetails, report: &mut ValidationReport) {
    if let (Some(min), Some(max)) = (lf.min_words, lf.max_words) {
        if min > max {
            report.error(format!("minimum word count {} exceeds maximum {}", min, max));
        }
    }
    if lf.rubric.is_none() && lf.sample_answer.is_none() {
        report.warn("no rubric or sample answer for the reviewer");
    }
}

fn check_matching(m: &MatchingDetails, report: &mut ValidationReport) {
    if m.left_items.is_empty() {
        report.error("matching has no left items");
    }
    if m.right_items.is_empty() {
        report.error("matching has no right items");
    }
    check_unique_ids("left item", m.left_items.iter().map(|i| i.id.as_str()), report);
    check_unique_ids("right item", m.right_items.iter().map(|i| i.id.as_str()), report);

    let rights: HashSet<&str> = m.right_items.iter().map(|i| i.id.as_str()).collect();
    let mut pairs_per_left: HashMap<&str, usize> = HashMap::new();
    for pair in &m.correct_pairs {
        *pairs_per_left.entry(pair.left_id.as_str()).or_default() += 1;
        if !rights.contains(pair.right_id.as_str()) {
            report.error(format!("pair refers to unknown right item `{}`", pair.right_id));
        }
    }
    for item in &m.left_items {
        match pairs_per_left.get(item.id.as_str()).copied().unwrap_or(0) {
            1 => {}
            0 => report.error(format!("left item `{}` has no correct pair", item.id)),
            n => report.error(format!("left item `{}` has {} correct pairs", item.id, n)),
        }
    }
    let lefts: HashSet<&str> = m.left_items.iter().map(|i| i.id.as_str()).collect();
    for pair in &m.correct_pairs {
        if !lefts.contains(pair.left_id.as_str()) {
            report.error(format!("pair refers to unknown left item `{}`", pair.left_id));
        }
    }
}

fn check_ordering(o: &OrderingDetails, report: &mut ValidationReport) {
    match o.items.len() {
        0 => report.error("ordering has no items"),
        1 => report.warn("ordering has a single item"),
        _ => {}
    }
    check_unique_ids("ordering item", o.items.iter().map(|i| i.id.as_str()), report);

    let mut positions: Vec<usize> = o.items.iter().map(|i| i.correct_position).collect();
    positions.sort_unstable();
    if positions.iter().enumerate().any(|(i, p)| *p != i + 1) {
        report.error("correct positions must run 1..n without gaps or repeats");
    }
}

fn check_classification(c: &ClassificationDetails, report: &mut ValidationReport) {
    if c.categories.is_empty() {
        report.error("classification has no categories");
    }
    if c.items.is_empty() {
        report.error("classification has no items");
    }
    check_unique_ids("category", c.categories.iter().map(|cat| cat.id.as_str()), report);
    check_unique_ids("classification item", c.items.iter().map(|i| i.id.as_str()), report);

    let categories: HashSet<&str> = c.categories.iter().map(|cat| cat.id.as_str()).collect();
    for item in &c.items {
        if !categories.contains(item.correct_category.as_str()) {
            report.error(format!(
                "item `{}` belongs to unknown category `{}`",
                item.id, item.correct_category
            ));
        }
    }
    let used: HashSet<&str> = c.items.iter().map(|i| i.correct_category.as_str()).collect();
    for cat in &c.categories {
        if !used.contains(cat.id.as_str()) {
            report.warn(format!("category `{}` has no items", cat.name));
        }
    }
}

fn in_options(options: &[String], answer: &str) -> bool {
    options.iter().any(|o| text::eq_loose(o, answer))
}

fn check_visual_identification(v: &VisualIdentificationDetails, report: &mut ValidationReport) {
    if v.correct_answer.trim().is_empty() {
        report.error("correct answer is empty");
    } else if !v.options.is_empty() && !in_options(&v.options, &v.correct_answer) {
        report.error("correct answer is not among the options");
    }
    if v.visual.is_none() {
        report.warn("no visual attached");
    }
}

fn check_counting(c: &CountingDetails, report: &mut ValidationReport) {
    if c.visual.is_none() {
        report.warn("no visual to count");
    }
    if !c.options.is_empty()
        && !c
            .options
            .iter()
            .any(|o| text::parse_number_permissive(o) == Some(c.correct_count as f64))
    {
        report.error(format!("no option reads {}", c.correct_count));
    }
}

fn check_pattern(p: &PatternRecognitionDetails, report: &mut ValidationReport) {
    if p.sequence.is_empty() {
        report.error("pattern sequence is empty");
    }
    if p.correct_answer.trim().is_empty() {
        report.error("next item is empty");
    } else if !p.options.is_empty() && !in_options(&p.options, &p.correct_answer) {
        report.error("next item is not among the options");
    }
}

fn check_diagram(d: &DiagramLabelingDetails, report: &mut ValidationReport) {
    if d.labels.is_empty() {
        report.error("diagram has no label points");
    }
    check_unique_ids("label", d.labels.iter().map(|l| l.id.as_str()), report);
    for label in &d.labels {
        if label.correct_label.trim().is_empty() {
            report.error(format!("label `{}` has no correct text", label.id));
        } else if !d.label_bank.is_empty() && !in_options(&d.label_bank, &label.correct_label) {
            report.error(format!("label bank lacks `{}`", label.correct_label));
        }
    }
    if d.diagram.is_none() {
        report.warn("no diagram attached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{
        ChoiceOption, Difficulty, FillBlankDetails, MatchItem, MatchPair, OrderItem, OrderType,
        QuestionMetadata, TrueFalseDetails,
    };

    fn question(kind: QuestionKind) -> Question {
        Question {
            id: "q1".into(),
            content: "prompt".into(),
            topic: String::new(),
            subject: String::new(),
            difficulty: Difficulty::Easy,
            points: 10.0,
            explanation: None,
            hints: vec![],
            metadata: QuestionMetadata {
                estimated_time: 30,
                ..Default::default()
            },
            kind,
        }
    }

    fn option(id: &str, correct: bool) -> ChoiceOption {
        ChoiceOption {
            id: id.into(),
            text: id.to_uppercase(),
            is_correct: correct,
        }
    }

    #[test]
    fn single_answer_choice_needs_exactly_one_correct() {
        let svc = ValidationService::new();
        let ok = question(QuestionKind::MultipleChoice(MultipleChoiceDetails {
            options: vec![option("a", true), option("b", false)],
            allow_multiple: false,
        }));
        assert!(svc.validate(&ok).is_valid);

        let two = question(QuestionKind::MultipleChoice(MultipleChoiceDetails {
            options: vec![option("a", true), option("b", true)],
            allow_multiple: false,
        }));
        assert!(!svc.validate(&two).is_valid);

        let none = question(QuestionKind::MultipleChoice(MultipleChoiceDetails {
            options: vec![option("a", false)],
            allow_multiple: true,
        }));
        let report = svc.validate(&none);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn base_fields_are_checked() {
        let mut q = question(QuestionKind::TrueFalse(TrueFalseDetails {
            statement: "sky is blue".into(),
            correct_answer: true,
        }));
        q.points = -1.0;
        q.content = "  ".into();
        let report = ValidationService::new().validate(&q);
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn template_must_reference_every_blank() {
        let blank = |id: &str| Blank {
            id: id.into(),
            correct_answers: vec!["x".into()],
            case_sensitive: false,
        };
        let q = question(QuestionKind::FillBlank(FillBlankDetails {
            template: "a {{blank_0}} b".into(),
            blanks: vec![blank("blank_0"), blank("blank_1")],
        }));
        let report = ValidationService::new().validate(&q);
        assert_eq!(report.errors, vec!["template does not reference blank `blank_1`"]);
    }

    #[test]
    fn leftover_blank_marker_is_flagged() {
        let q = question(QuestionKind::FillBlank(FillBlankDetails {
            template: "Set {{x}} and ___ now".into(),
            blanks: vec![Blank {
                id: "x".into(),
                correct_answers: vec!["a".into()],
                case_sensitive: false,
            }],
        }));
        let report = ValidationService::new().validate(&q);
        assert!(report.is_valid);
        assert_eq!(report.warnings, vec!["template has 1 unreplaced blank marker(s)"]);
    }

    #[test]
    fn matching_left_items_pair_exactly_once() {
        let item = |id: &str| MatchItem {
            id: id.into(),
            text: id.into(),
        };
        let pair = |l: &str, r: &str| MatchPair {
            left_id: l.into(),
            right_id: r.into(),
        };
        let q = question(QuestionKind::Matching(MatchingDetails {
            left_items: vec![item("l0"), item("l1")],
            right_items: vec![item("r0"), item("r1")],
            correct_pairs: vec![pair("l0", "r0"), pair("l0", "r1")],
            allow_partial_credit: true,
        }));
        let report = ValidationService::new().validate(&q);
        assert!(report.errors.iter().any(|e| e.contains("`l0` has 2")));
        assert!(report.errors.iter().any(|e| e.contains("`l1` has no")));
    }

    #[test]
    fn ordering_positions_form_a_permutation() {
        let item = |id: &str, pos: usize| OrderItem {
            id: id.into(),
            text: id.into(),
            correct_position: pos,
        };
        let svc = ValidationService::new();
        let good = question(QuestionKind::Ordering(OrderingDetails {
            items: vec![item("a", 2), item("b", 1)],
            order_type: OrderType::Sequence,
            allow_partial_credit: true,
        }));
        assert!(svc.validate(&good).is_valid);

        let gap = question(QuestionKind::Ordering(OrderingDetails {
            items: vec![item("a", 1), item("b", 3)],
            order_type: OrderType::Sequence,
            allow_partial_credit: true,
        }));
        assert!(!svc.validate(&gap).is_valid);
    }

    #[test]
    fn zero_points_is_only_a_warning() {
        let mut q = question(QuestionKind::Essay(LongFormDetails::default()));
        q.points = 0.0;
        let report = ValidationService::new().validate(&q);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 2);
    }
}
