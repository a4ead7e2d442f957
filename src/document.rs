//! # Structured Document
//!
//! The universal request/response envelope shared by the REST and queue paths.
//! A document is a `serde_json::Value` tree; helpers here cover the few places
//! where the dispatch core shapes documents itself:
//!
//! - [`parse_payload`]: tolerant decoding of inbound queue bytes
//! - [`normalize_result`]: wrapping scalar and null handler results
//! - [`merge_shallow`]: key-union of two objects with right-hand precedence

use serde_json::{Map, Value};

/// Generic key/value tree passed between transports and handlers.
pub type Document = Value;

/// Field used to wrap scalar and null handler results.
pub const RESULT_FIELD: &str = "result";

/// Field used to wrap inbound queue payloads that are not valid JSON.
pub const MESSAGE_FIELD: &str = "message";

/// An empty JSON object.
#[must_use]
pub fn empty() -> Document {
    Value::Object(Map::new())
}

/// Decode a queue payload into a document.
///
/// Bytes that are not valid JSON are not an error: the raw text (lossy UTF-8)
/// is wrapped as `{ "message": <text> }`.
#[must_use]
pub fn parse_payload(payload: &[u8]) -> Document {
    match serde_json::from_slice::<Value>(payload) {
        Ok(doc) => doc,
        Err(_) => {
            let text = String::from_utf8_lossy(payload).into_owned();
            let mut map = Map::with_capacity(1);
            map.insert(MESSAGE_FIELD.to_string(), Value::String(text));
            Value::Object(map)
        }
    }
}

/// Normalize a handler's return value.
///
/// Objects and arrays pass through unchanged. Strings, numbers and booleans are
/// wrapped as `{ "result": <value> }`. `null` becomes `{ "result": null }` so the
/// field is always present.
#[must_use]
pub fn normalize_result(value: Value) -> Document {
    match value {
        Value::Object(_) | Value::Array(_) => value,
        scalar => {
            let mut map = Map::with_capacity(1);
            map.insert(RESULT_FIELD.to_string(), scalar);
            Value::Object(map)
        }
    }
}

/// Shallow key-union of `base` and `overlay`; `overlay` wins on collision.
///
/// A non-object `overlay` is stored under [`RESULT_FIELD`] after normalization
/// so it still contributes to the union.
#[must_use]
pub fn merge_shallow(base: Map<String, Value>, overlay: Value) -> Document {
    let mut merged = base;
    if let Value::Object(extra) = normalize_result(overlay) {
        for (key, value) in extra {
            merged.insert(key, value);
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_payload_accepts_json() {
        assert_eq!(parse_payload(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_payload(b"[1,2]"), json!([1, 2]));
    }

    #[test]
    fn parse_payload_wraps_plain_text() {
        assert_eq!(parse_payload(b"hello world"), json!({"message": "hello world"}));
    }

    #[test]
    fn parse_payload_wraps_truncated_json() {
        assert_eq!(parse_payload(br#"{"a":"#), json!({"message": "{\"a\":"}));
    }

    #[test]
    fn normalize_passes_structures_through() {
        assert_eq!(normalize_result(json!({"k": "v"})), json!({"k": "v"}));
        assert_eq!(normalize_result(json!([1])), json!([1]));
    }

    #[test]
    fn normalize_wraps_scalars_and_null() {
        assert_eq!(normalize_result(json!("ok")), json!({"result": "ok"}));
        assert_eq!(normalize_result(json!(3)), json!({"result": 3}));
        assert_eq!(normalize_result(json!(false)), json!({"result": false}));
        let null = normalize_result(Value::Null);
        assert_eq!(null, json!({"result": null}));
        assert!(null.as_object().unwrap().contains_key(RESULT_FIELD));
    }

    #[test]
    fn merge_overlay_wins() {
        let mut base = Map::new();
        base.insert("version".into(), json!("1.0.0"));
        base.insert("adapter".into(), json!(true));
        let merged = merge_shallow(base, json!({"version": "2.0.0", "owner": "ops"}));
        assert_eq!(
            merged,
            json!({"version": "2.0.0", "adapter": true, "owner": "ops"})
        );
    }
}
