//! Scancard JSON-over-TCP control client.
//!
//! One request per connection: `{"sid": 0, "cmd": "...", "data": {...}}` out,
//! a single unframed JSON object back whose `ret` field carries the result
//! code (0 = idle/ready).

mod client;
mod error;
mod framing;
mod io;
pub mod request;
mod response;
mod types;

#[cfg(test)]
pub(crate) mod mock;

// Re-export public API
pub use client::{ConnectionDiagnosis, MIN_TIMEOUT, ScancardClient};
pub use error::{Result, ScancardError};
pub use framing::{decode_text, trim_to_last_brace};
pub use request::{Command, CommandRequest, RequestData};
pub use response::{Response, is_ready, result_code_of};
pub use types::{BUSY_SENTINEL, DEFAULT_HOST, DEFAULT_PORT, READY, RECV_BUFFER_SIZE, SESSION_ID};
