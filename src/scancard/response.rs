//! Interpretation of scancard responses.

use serde_json::{Map, Value};

use super::error::Result;
use super::framing::parse_object;
use super::types::{BUSY_SENTINEL, READY, RESULT_KEY};

/// Decoded response object.
///
/// Only the result code is interpreted; the rest is opaque payload kept for
/// logging and for callers that read parameter sets back.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    payload: Map<String, Value>,
}

impl Response {
    /// Frame and decode raw response bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        parse_object(bytes).map(Self::from_object)
    }

    pub fn from_object(payload: Map<String, Value>) -> Self {
        Self { payload }
    }

    /// Result code as sent by the device; `None` when absent or not an integer.
    pub fn raw_result_code(&self) -> Option<i64> {
        self.payload.get(RESULT_KEY).and_then(Value::as_i64)
    }

    /// Result code, or the busy sentinel when the device did not report one.
    pub fn result_code(&self) -> i64 {
        self.raw_result_code().unwrap_or(BUSY_SENTINEL)
    }

    /// Whether the device reported itself idle and ready.
    pub fn is_ready(&self) -> bool {
        self.result_code() == READY
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Indented JSON for logs.
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.payload).unwrap_or_else(|_| format!("{:?}", self.payload))
    }
}

/// Result code of a transaction outcome. Failures read as the busy sentinel.
pub fn result_code_of<E>(outcome: &std::result::Result<Response, E>) -> i64 {
    match outcome {
        Ok(response) => response.result_code(),
        Err(_) => BUSY_SENTINEL,
    }
}

/// Polling predicate: only a decoded response with code 0 means ready.
pub fn is_ready<E>(outcome: &std::result::Result<Response, E>) -> bool {
    result_code_of(outcome) == READY
}
