//! Payload normalization.
//!
//! The model writes the answer payload, so everything in it is untrusted. The
//! identity fields are always taken from configuration, never from the model.

use serde_json::{json, Map, Value};

use super::StoredValueCache;
use crate::config::Credentials;
use crate::util::preview;

/// Prefix marking an answer that refers to a cached value.
pub const STORED_PREFIX: &str = "STORED:";

/// Characters of the answer kept in log previews.
const ANSWER_PREVIEW_CHARS: usize = 100;

/// Turn a model-produced payload into the request body actually sent.
///
/// - non-object payloads become `{"answer": payload}`
/// - `email` and `secret` are overwritten from `credentials`
/// - a string answer `STORED:<key>` is replaced by the cached value, or `""`
///   if the key is unknown
pub fn normalize_payload(
    payload: Value,
    credentials: &Credentials,
    store: &StoredValueCache,
) -> Value {
    let mut body = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("answer".to_string(), other);
            map
        }
    };

    let expanded = match body.get("answer") {
        Some(Value::String(answer)) => answer
            .strip_prefix(STORED_PREFIX)
            .map(|key| store.get(key.trim()).unwrap_or_default()),
        _ => None,
    };
    if let Some(value) = expanded {
        body.insert("answer".to_string(), Value::String(value));
    }

    body.insert("email".to_string(), Value::String(credentials.email.clone()));
    body.insert(
        "secret".to_string(),
        Value::String(credentials.secret.clone()),
    );

    Value::Object(body)
}

/// Log-safe summary of a normalized payload. Never contains the secret.
pub fn payload_preview(payload: &Value) -> Value {
    let answer = match payload.get("answer") {
        Some(Value::String(s)) => preview(s, ANSWER_PREVIEW_CHARS),
        Some(other) => preview(&other.to_string(), ANSWER_PREVIEW_CHARS),
        None => String::new(),
    };
    let has_secret = payload
        .get("secret")
        .and_then(Value::as_str)
        .map_or(false, |s| !s.is_empty());

    json!({
        "answer": answer,
        "email": payload.get("email").and_then(Value::as_str).unwrap_or(""),
        "url": payload.get("url").and_then(Value::as_str).unwrap_or(""),
        "has_secret": has_secret,
    })
}
