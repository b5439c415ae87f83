use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

pub const REQUIRED: &str = "answer_required";
pub const WORD_LIMIT: &str = "under_word_limit";
pub const CHARACTER_LIMIT: &str = "under_character_limit";
pub const INVALID_FORMAT: &str = "invalid_format";

/// Declarative rule for one payload field. Limits apply to string values;
/// a non-string value for a rule-covered field is an `invalid_format`.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub required: bool,
    pub max_words: Option<usize>,
    pub max_chars: Option<usize>,
}

pub const CLARIFICATION_QUESTION_RULES: &[FieldRule] = &[
    FieldRule {
        field: "question",
        required: true,
        max_words: Some(100),
        max_chars: Some(5000),
    },
    FieldRule {
        field: "answer",
        required: true,
        max_words: Some(100),
        max_chars: Some(5000),
    },
];

pub const BRIEF_RULES: &[FieldRule] = &[FieldRule {
    field: "title",
    required: false,
    max_words: None,
    max_chars: Some(100),
}];

/// Checks a cleaned payload against a rule set, collecting every failing
/// field rather than stopping at the first.
pub fn validate(data: &Map<String, Value>, rules: &[FieldRule]) -> AppResult<()> {
    let mut errors = BTreeMap::new();

    for rule in rules {
        if let Some(code) = check_field(data.get(rule.field), rule) {
            errors.insert(rule.field.to_owned(), code.to_owned());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn check_field(value: Option<&Value>, rule: &FieldRule) -> Option<&'static str> {
    let text = match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.trim()),
        Some(_) => return Some(INVALID_FORMAT),
    };

    match text {
        None | Some("") => rule.required.then_some(REQUIRED),
        Some(text) => {
            if let Some(limit) = rule.max_words {
                if word_count(text) > limit {
                    return Some(WORD_LIMIT);
                }
            }
            if let Some(limit) = rule.max_chars {
                if text.chars().count() > limit {
                    return Some(CHARACTER_LIMIT);
                }
            }
            None
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(data: serde_json::Value, rules: &[FieldRule]) -> Result<(), AppError> {
        validate(data.as_object().expect("object payload"), rules)
    }

    fn assert_code(result: Result<(), AppError>, field: &str, code: &str) {
        match result {
            Err(AppError::Validation(errors)) => assert_eq!(errors.get(field).map(String::as_str), Some(code)),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn accepts_valid_question_and_answer() {
        let data = json!({"question": "Why?", "answer": "Because"});
        assert!(check(data, CLARIFICATION_QUESTION_RULES).is_ok());
    }

    #[test]
    fn missing_required_field() {
        let data = json!({"question": "Why?"});
        assert_code(check(data, CLARIFICATION_QUESTION_RULES), "answer", REQUIRED);
    }

    #[test]
    fn blank_required_field() {
        let data = json!({"question": "", "answer": "Because"});
        assert_code(check(data, CLARIFICATION_QUESTION_RULES), "question", REQUIRED);
    }

    #[test]
    fn one_hundred_words_is_allowed() {
        let text = ["word"; 100].join(" ");
        let data = json!({"question": text, "answer": "Because"});
        assert!(check(data, CLARIFICATION_QUESTION_RULES).is_ok());
    }

    #[test]
    fn words_over_the_limit() {
        let text = ["word"; 101].join(" ");
        let data = json!({"question": "Why?", "answer": text});
        assert_code(check(data, CLARIFICATION_QUESTION_RULES), "answer", WORD_LIMIT);
    }

    #[test]
    fn characters_over_the_limit() {
        let text = "a".repeat(5001);
        let data = json!({"question": text, "answer": "Because"});
        assert_code(
            check(data, CLARIFICATION_QUESTION_RULES),
            "question",
            CHARACTER_LIMIT,
        );
    }

    #[test]
    fn brief_title_character_limit() {
        let data = json!({"title": "my title".repeat(30)});
        assert_code(check(data, BRIEF_RULES), "title", CHARACTER_LIMIT);
    }

    #[test]
    fn absent_optional_field_is_fine() {
        assert!(check(json!({}), BRIEF_RULES).is_ok());
    }

    #[test]
    fn non_string_value_for_limited_field() {
        let data = json!({"question": 7, "answer": "Because"});
        assert_code(check(data, CLARIFICATION_QUESTION_RULES), "question", INVALID_FORMAT);
    }

    #[test]
    fn collects_every_failing_field() {
        let data = json!({});
        match check(data, CLARIFICATION_QUESTION_RULES) {
            Err(AppError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
