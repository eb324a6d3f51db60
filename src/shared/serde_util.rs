//! Helpers for reading loosely-typed exchange JSON.
//!
//! Exchanges disagree on whether numbers arrive as JSON strings or numbers.
//! Adapters read through these helpers and keep numeric values as strings so
//! the normalization core decides how to parse them.

use serde_json::Value;

/// Read `key` as a string, accepting JSON strings and numbers.
pub fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(as_string)
}

/// Convert a scalar JSON value to its string form.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read `key` as an integer, accepting JSON strings and numbers.
pub fn i64_field(value: &Value, key: &str) -> Option<i64> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Read `key` as an unsigned integer, accepting JSON strings and numbers.
pub fn u64_field(value: &Value, key: &str) -> Option<u64> {
    match value.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn bool_field(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

/// Read `key` as an array, yielding an empty slice when absent.
pub fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_str_field_accepts_strings_and_numbers() {
        let v = json!({"a": "1.5", "b": 2, "c": null, "d": ""});
        assert_eq!(str_field(&v, "a").as_deref(), Some("1.5"));
        assert_eq!(str_field(&v, "b").as_deref(), Some("2"));
        assert_eq!(str_field(&v, "c"), None);
        assert_eq!(str_field(&v, "d"), None);
        assert_eq!(str_field(&v, "missing"), None);
    }

    #[test]
    fn test_integer_fields() {
        let v = json!({"ts": "1597026383085", "seq": 42, "neg": -1});
        assert_eq!(i64_field(&v, "ts"), Some(1_597_026_383_085));
        assert_eq!(u64_field(&v, "seq"), Some(42));
        assert_eq!(u64_field(&v, "neg"), None);
        assert_eq!(i64_field(&v, "neg"), Some(-1));
    }

    #[test]
    fn test_array_field_defaults_empty() {
        let v = json!({"data": [1, 2]});
        assert_eq!(array_field(&v, "data").len(), 2);
        assert!(array_field(&v, "none").is_empty());
    }
}
