//! Payload decoding.
//!
//! Event-stream payloads arrive as raw text. The lenient chain always
//! resolves to some value: JSON first, then a full-token integer parse of
//! the trimmed text, then the raw text unchanged. The strict variant
//! accepts JSON only and reports everything else as a decode failure; it is
//! opt-in via [`DecodeMode::Strict`].

use serde_json::Value;

use crate::error::{FeedError, Result};
use crate::types::DecodeMode;

/// Decode a raw payload under the given mode.
///
/// Lenient decoding never fails; strict decoding fails with
/// [`FeedError::Decode`] on anything that is not valid JSON.
pub fn decode_payload(raw: &str, mode: DecodeMode) -> Result<Value> {
    match mode {
        DecodeMode::Lenient => Ok(decode_lenient(raw)),
        DecodeMode::Strict => decode_strict(raw),
    }
}

fn decode_lenient(raw: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    if let Ok(n) = raw.trim().parse::<i64>() {
        return Value::from(n);
    }
    Value::String(raw.to_owned())
}

fn decode_strict(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| FeedError::Decode(e.to_string()))
}
