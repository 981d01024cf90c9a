//! Read access to loosely structured generator output.
//!
//! Every lookup tries the snake_case key first and falls back to the camelCase one, and
//! JSON `null` is treated the same as a missing key.

use serde_json::{Map, Value as JsonValue};

/// Visual values that mean "no visual" rather than literal content.
pub const VISUAL_PLACEHOLDERS: &[&str] = &[
    "",
    "none",
    "null",
    "n/a",
    "placeholder",
    "[visual]",
    "no visual",
    "visual_placeholder",
];

#[derive(Debug, Clone, Copy)]
pub struct RawPayload<'a> {
    value: &'a JsonValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawOption {
    pub id: Option<String>,
    pub text: String,
    pub is_correct: Option<bool>,
}

impl<'a> RawPayload<'a> {
    pub fn new(value: &'a JsonValue) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &'a JsonValue {
        self.value
    }

    fn object(&self) -> Option<&'a Map<String, JsonValue>> {
        self.value.as_object()
    }

    pub fn key(&self, key: &str) -> Option<&'a JsonValue> {
        self.object()?.get(key).filter(|v| !v.is_null())
    }

    pub fn get(&self, snake: &str, camel: &str) -> Option<&'a JsonValue> {
        self.key(snake).or_else(|| self.key(camel))
    }

    /// First present key among several single-spelling aliases.
    pub fn first(&self, keys: &[&str]) -> Option<&'a JsonValue> {
        keys.iter().find_map(|k| self.key(k))
    }

    pub fn string(&self, snake: &str, camel: &str) -> Option<String> {
        self.get(snake, camel).and_then(value_text)
    }

    pub fn number(&self, snake: &str, camel: &str) -> Option<f64> {
        self.get(snake, camel).and_then(value_number)
    }

    pub fn boolean(&self, snake: &str, camel: &str) -> Option<bool> {
        match self.get(snake, camel)? {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::String(s) => crate::utils::text::truth_value(s),
            JsonValue::Number(n) => n.as_f64().map(|n| n != 0.0),
            _ => None,
        }
    }

    /// A string or a list of strings, as a list.
    pub fn string_list(&self, snake: &str, camel: &str) -> Vec<String> {
        match self.get(snake, camel) {
            Some(JsonValue::Array(items)) => items.iter().filter_map(value_text).collect(),
            Some(other) => value_text(other).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// The prompt text: `question`, then `content`, then `prompt`.
    pub fn prompt(&self) -> Option<String> {
        self.first(&["question", "content", "prompt"])
            .and_then(value_text)
    }

    pub fn explicit_type(&self) -> Option<&'a str> {
        self.key("type")
            .or_else(|| self.get("question_type", "questionType"))
            .and_then(|v| v.as_str())
    }

    pub fn correct_answer(&self) -> Option<&'a JsonValue> {
        self.get("correct_answer", "correctAnswer")
    }

    pub fn options(&self) -> Vec<RawOption> {
        match self.first(&["options", "choices"]) {
            Some(JsonValue::Array(items)) => items.iter().filter_map(raw_option).collect(),
            Some(JsonValue::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| {
                    value_text(v).map(|text| RawOption {
                        id: Some(k.clone()),
                        text,
                        is_correct: None,
                    })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn option_texts(&self) -> Vec<String> {
        self.options().into_iter().map(|o| o.text).collect()
    }

    /// Visual descriptor from `visual` (or its aliases), either a bare string or an
    /// object carrying `content`/`text`. Placeholder sentinels yield `None`.
    pub fn visual(&self) -> Option<String> {
        self.key("visual")
            .or_else(|| self.get("visual_content", "visualContent"))
            .or_else(|| self.first(&["image", "media", "diagram"]))
            .and_then(visual_descriptor)
    }

    pub fn grade(&self) -> Option<String> {
        self.key("grade")
            .or_else(|| self.get("grade_level", "gradeLevel"))
            .or_else(|| self.key("metadata").and_then(|m| m.get("gradeLevel")))
            .and_then(value_text)
    }
}

pub fn value_text(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn value_number(v: &JsonValue) -> Option<f64> {
    match v {
        JsonValue::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        JsonValue::String(s) => crate::utils::text::parse_number_permissive(s),
        _ => None,
    }
}

fn raw_option(v: &JsonValue) -> Option<RawOption> {
    if let Some(obj) = v.as_object() {
        let text = ["text", "label", "value", "content", "option"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(value_text))?;
        let id = obj.get("id").and_then(value_text);
        let is_correct = ["is_correct", "isCorrect", "correct"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|b| b.as_bool()));
        return Some(RawOption {
            id,
            text,
            is_correct,
        });
    }
    value_text(v).map(|text| RawOption {
        id: None,
        text,
        is_correct: None,
    })
}

pub fn is_placeholder_visual(s: &str) -> bool {
    let t = s.trim().to_ascii_lowercase();
    VISUAL_PLACEHOLDERS.contains(&t.as_str())
}

pub fn visual_descriptor(v: &JsonValue) -> Option<String> {
    let text = match v {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Object(obj) => ["content", "text", "emoji", "description", "alt"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(value_text)),
        _ => None,
    }?;
    (!is_placeholder_visual(&text)).then_some(text)
}
