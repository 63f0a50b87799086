//! Scancard protocol constants.

/// Default host of the scancard JSON service.
pub const DEFAULT_HOST: &str = "localhost";

/// Default TCP port of the scancard JSON service.
pub const DEFAULT_PORT: u16 = 50000;

/// Session id sent with every request. The device only serves one session.
pub const SESSION_ID: u32 = 0;

/// Result code reported by an idle scancard ready for the next command.
pub const READY: i64 = 0;

/// Result code assumed until a response says otherwise.
pub const BUSY_SENTINEL: i64 = 1;

/// Key of the result code in a response object.
pub const RESULT_KEY: &str = "ret";

/// Default size of the single response read.
pub const RECV_BUFFER_SIZE: usize = 1024;
