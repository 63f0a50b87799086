//! Best-effort framing of the scancard's response bytes.
//!
//! The device does not length-prefix its responses. The bytes from one read
//! are decoded permissively (invalid sequences become U+FFFD), everything
//! after the last `}` is dropped, and the rest is parsed as one JSON object.
//! Two concatenated objects or an object cut off by the read size therefore
//! fail to parse; that is reported as a decode error, never repaired.

use std::borrow::Cow;

use serde_json::{Map, Value};

use super::error::{Result, ScancardError};

/// Decode response bytes, replacing invalid sequences.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Text up to and including the last `}`; empty when there is none.
pub fn trim_to_last_brace(text: &str) -> &str {
    match text.rfind('}') {
        Some(end) => &text[..=end],
        None => "",
    }
}

/// Frame and parse one response into a JSON object.
pub fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>> {
    if bytes.is_empty() {
        return Err(ScancardError::Decode("Empty response".to_string()));
    }

    let text = decode_text(bytes);
    let document = trim_to_last_brace(&text);
    if document.is_empty() {
        return Err(ScancardError::Decode(format!(
            "No JSON object in {} response bytes",
            bytes.len()
        )));
    }

    match serde_json::from_str::<Value>(document) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(ScancardError::Decode(format!(
            "Expected a JSON object, got {}",
            kind_of(&other)
        ))),
        Err(e) => Err(ScancardError::Decode(e.to_string())),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
