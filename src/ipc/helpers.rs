use crate::error::{BookingError, BookingResult};
use crate::validation::parse_integer;

pub fn required_str(params: &serde_json::Value, key: &str) -> BookingResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| BookingError::validation(key, format!("missing {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> String {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Ids and counts arrive as numbers or digit strings.
pub fn required_int(params: &serde_json::Value, key: &str) -> BookingResult<i64> {
    let Some(raw) = params.get(key) else {
        return Err(BookingError::validation(key, format!("missing {}", key)));
    };
    parse_integer(raw)
        .ok_or_else(|| BookingError::validation(key, format!("{} must be an integer", key)))
}

/// Checkbox-style flags: `true`, `1`, `"1"`, `"on"` and `"true"` are set.
pub fn flag(params: &serde_json::Value, key: &str) -> bool {
    match params.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_i64() == Some(1),
        Some(serde_json::Value::String(s)) => matches!(s.as_str(), "1" | "on" | "true"),
        _ => false,
    }
}
