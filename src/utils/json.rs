use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Pulls the named resource object out of a request envelope like
/// `{"briefs": {...}, "update_details": {...}}`.
pub fn resource_payload<'a>(payload: &'a Value, key: &str) -> AppResult<&'a Map<String, Value>> {
    payload
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::bad_request(format!("Invalid JSON must have '{key}' key")))
}

/// The audit actor for a mutating call. Mandatory on every write endpoint.
pub fn updated_by(payload: &Value) -> AppResult<String> {
    payload
        .get("update_details")
        .and_then(|details| details.get("updated_by"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            AppError::bad_request("Invalid JSON must have 'update_details.updated_by' key")
        })
}

/// A payload field holding a uuid reference, e.g. `"userId"`.
pub fn uuid_field(payload: &Map<String, Value>, key: &str) -> AppResult<Uuid> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| AppError::bad_request(format!("Invalid JSON must have '{key}' key")))
}

/// Cleans an incoming data blob before it is stored: reserved and computed
/// keys are dropped, nulls are dropped, strings are trimmed, and the same
/// rules recurse into nested objects and lists. Inside lists, entries that
/// trim down to nothing are removed entirely. Applying this twice yields the
/// same result as applying it once.
pub fn clean_data(data: &Map<String, Value>, reserved: &[&str]) -> Map<String, Value> {
    let mut cleaned = Map::new();
    for (key, value) in data {
        if reserved.contains(&key.as_str()) {
            continue;
        }
        if let Some(kept) = clean_value(value) {
            cleaned.insert(key.clone(), kept);
        }
    }
    cleaned
}

fn clean_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(Value::String(text.trim().to_owned())),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(clean_value)
                .filter(|item| !matches!(item, Value::String(text) if text.is_empty()))
                .collect(),
        )),
        Value::Object(map) => Some(Value::Object(clean_data(map, &[]))),
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::clean_data;
    use serde_json::{json, Map, Value};

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn strips_nulls() {
        let cleaned = clean_data(&object(json!({"foo": "bar", "bar": null})), &[]);
        assert_eq!(Value::Object(cleaned), json!({"foo": "bar"}));
    }

    #[test]
    fn trims_strings_but_keeps_empty_top_level_values() {
        let cleaned = clean_data(&object(json!({"foo": " bar ", "bar": "", "other": "  "})), &[]);
        assert_eq!(
            Value::Object(cleaned),
            json!({"foo": "bar", "bar": "", "other": ""})
        );
    }

    #[test]
    fn drops_empty_entries_inside_lists() {
        let cleaned = clean_data(&object(json!({"foo": " bar ", "bar": ["", "  foo"]})), &[]);
        assert_eq!(Value::Object(cleaned), json!({"foo": "bar", "bar": ["foo"]}));
    }

    #[test]
    fn recurses_into_nested_objects() {
        let cleaned = clean_data(
            &object(json!({"outer": {"inner": " trimmed ", "gone": null}})),
            &[],
        );
        assert_eq!(Value::Object(cleaned), json!({"outer": {"inner": "trimmed"}}));
    }

    #[test]
    fn removes_reserved_keys() {
        let cleaned = clean_data(
            &object(json!({"frameworkSlug": "x", "title": "y"})),
            &["frameworkSlug"],
        );
        assert_eq!(Value::Object(cleaned), json!({"title": "y"}));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let first = clean_data(
            &object(json!({"foo": " bar ", "bar": null, "list": [" x ", ""]})),
            &[],
        );
        let second = clean_data(&first, &[]);
        assert_eq!(first, second);
    }
}
