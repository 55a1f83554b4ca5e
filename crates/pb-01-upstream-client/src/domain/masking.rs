//! Masking of sensitive values before they reach the logs.

use serde_json::Value;

/// JSON keys whose values never appear in logs unmasked (case-insensitive).
const SENSITIVE_KEYS: &[&str] = &[
    "accountnumber",
    "cardnumber",
    "password",
    "token",
    "key",
    "secret",
    "apikey",
    "apisecret",
    "emails",
    "phones",
];

fn is_sensitive(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&lower.as_str())
}

/// Keep the first and last character and star out the rest.
/// Values of four characters or fewer are starred completely.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    if len <= 4 {
        return "*".repeat(len);
    }
    let mut masked = String::with_capacity(len);
    masked.push(chars[0]);
    masked.push_str(&"*".repeat(len - 2));
    masked.push(chars[len - 1]);
    masked
}

/// Copy of `value` with every sensitive field masked, at any depth.
pub fn mask_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if is_sensitive(k) { mask_all(v) } else { mask_json(v) };
                    (k.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(mask_json).collect()),
        other => other.clone(),
    }
}

fn mask_all(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(mask_value(s)),
        Value::Number(n) => Value::String(mask_value(&n.to_string())),
        Value::Array(items) => Value::Array(items.iter().map(mask_all).collect()),
        Value::Object(map) => Value::Object(
            map.iter().map(|(k, v)| (k.clone(), mask_all(v))).collect(),
        ),
        other => other.clone(),
    }
}

/// Loggable rendering of a raw payload. Non-JSON payloads are summarised by size.
pub fn mask_payload(payload: &[u8]) -> String {
    match serde_json::from_slice::<Value>(payload) {
        Ok(value) => mask_json(&value).to_string(),
        Err(_) => format!("<{} bytes>", payload.len()),
    }
}
