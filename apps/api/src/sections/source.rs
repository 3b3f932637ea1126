//! Lenient readers over a JSON Resume shaped source document.

use serde_json::Value;

/// Non-empty, trimmed string at a JSON pointer (e.g. `/basics/name`).
pub fn text<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Array under `key`, or empty when absent or not an array.
pub fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Non-empty strings of an array under `key`.
pub fn strings(value: &Value, key: &str) -> Vec<String> {
    items(value, key)
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_ignores_blank_values() {
        let source = json!({"basics": {"name": "  ", "label": " Engineer "}});
        assert_eq!(text(&source, "/basics/name"), None);
        assert_eq!(text(&source, "/basics/label"), Some("Engineer"));
        assert_eq!(text(&source, "/basics/email"), None);
    }

    #[test]
    fn test_items_tolerates_wrong_shapes() {
        let source = json!({"work": "not a list"});
        assert!(items(&source, "work").is_empty());
        assert!(items(&source, "education").is_empty());
    }
}
