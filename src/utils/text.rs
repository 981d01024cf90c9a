use std::ops::Range;

/// Lowercased alphanumeric tokens.
pub fn words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Word-boundary aware phrase search, case-insensitive.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let haystack = words(text);
    let needle = words(phrase);
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

pub fn contains_any_phrase(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| contains_phrase(text, p))
}

/// Trim, collapse inner whitespace, and fold case unless `case_sensitive`.
pub fn normalize_answer(s: &str, case_sensitive: bool) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if case_sensitive {
        collapsed
    } else {
        collapsed.to_lowercase()
    }
}

pub fn eq_loose(a: &str, b: &str) -> bool {
    normalize_answer(a, false) == normalize_answer(b, false)
}

/// Parses a trimmed string as a finite number, nothing else allowed.
pub fn parse_number_strict(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Drops everything except digits, sign and decimal point before parsing, so
/// "1,000", "$12.50" and "3 apples" all parse.
pub fn parse_number_permissive(s: &str) -> Option<f64> {
    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    kept.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn truth_value(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "correct" | "right" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "incorrect" | "wrong" => Some(false),
        _ => None,
    }
}

/// Byte ranges of every run of three or more underscores.
pub fn blank_markers(s: &str) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        match (c == '_', start) {
            (true, None) => start = Some(i),
            (false, Some(st)) => {
                if i - st >= 3 {
                    out.push(st..i);
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(st) = start {
        if s.len() - st >= 3 {
            out.push(st..s.len());
        }
    }
    out
}

pub fn has_blank_marker(s: &str) -> bool {
    !blank_markers(s).is_empty()
}

pub fn placeholder(id: &str) -> String {
    format!("{{{{{}}}}}", id)
}

/// Ids referenced as `{{id}}` in a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_spans(template)
        .into_iter()
        .map(|(_, id)| id)
        .collect()
}

/// Byte range and id of every `{{id}}` in a template.
pub fn placeholder_spans(template: &str) -> Vec<(Range<usize>, String)> {
    let mut out = Vec::new();
    let mut offset = 0;
    while let Some(close) = template[offset..].find("}}") {
        let close = offset + close;
        let head = &template[offset..close];
        if let Some(open) = head.rfind("{{") {
            let id = head[open + 2..].trim();
            if !id.is_empty() {
                out.push((offset + open..close + 2, id.to_string()));
            }
        }
        offset = close + 2;
    }
    out
}

/// "A"/"b)" style option letters to a zero-based index.
pub fn option_letter_index(s: &str) -> Option<usize> {
    let t = s.trim().trim_end_matches([')', '.', ':']);
    let mut chars = t.chars();
    let c = chars.next()?;
    if chars.next().is_some() || !c.is_ascii_alphabetic() {
        return None;
    }
    Some((c.to_ascii_lowercase() as u8 - b'a') as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_search_respects_word_boundaries() {
        assert!(contains_phrase("How many apples are there?", "how many"));
        assert!(contains_phrase("Count the stars", "count"));
        assert!(!contains_phrase("Which country is largest?", "count"));
        assert!(contains_phrase("What is the total number of legs?", "total number of"));
    }

    #[test]
    fn permissive_numbers() {
        assert_eq!(parse_number_permissive("1,000"), Some(1000.0));
        assert_eq!(parse_number_permissive("$12.50"), Some(12.5));
        assert_eq!(parse_number_permissive("-3 degrees"), Some(-3.0));
        assert_eq!(parse_number_permissive("three"), None);
        assert_eq!(parse_number_permissive("1.2.3"), None);
        assert_eq!(parse_number_strict(" 4 "), Some(4.0));
        assert_eq!(parse_number_strict("4 apples"), None);
    }

    #[test]
    fn finds_blank_markers() {
        let s = "The ___ sat on the _____ near __ it___";
        let ranges = blank_markers(s);
        assert_eq!(ranges.len(), 3);
        assert_eq!(&s[ranges[0].clone()], "___");
        assert_eq!(&s[ranges[1].clone()], "_____");
    }

    #[test]
    fn reads_placeholders() {
        assert_eq!(
            placeholders("a {{blank_0}} b {{ blank_1 }} {{"),
            vec!["blank_0".to_string(), "blank_1".to_string()]
        );
        assert_eq!(placeholder("blank_2"), "{{blank_2}}");
    }

    #[test]
    fn placeholder_spans_cover_the_braces() {
        let s = "Set {{x}} and ___ now";
        let spans = placeholder_spans(s);
        assert_eq!(spans.len(), 1);
        assert_eq!(&s[spans[0].0.clone()], "{{x}}");
        assert_eq!(spans[0].1, "x");
    }

    #[test]
    fn truth_and_letters() {
        assert_eq!(truth_value("Yes"), Some(true));
        assert_eq!(truth_value("FALSE"), Some(false));
        assert_eq!(truth_value("maybe"), None);
        assert_eq!(option_letter_index("B"), Some(1));
        assert_eq!(option_letter_index("c)"), Some(2));
        assert_eq!(option_letter_index("cat"), None);
    }
}
