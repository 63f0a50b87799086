//! Low-level socket I/O operations with timeout handling.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error};

use super::error::{Result, ScancardError};

/// Open a fresh connection to the scancard.
pub(crate) async fn connect(addr: &str, timeout_duration: Duration) -> Result<TcpStream> {
    let stream = timeout(timeout_duration, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            error!("Connection timeout to {addr}");
            ScancardError::Connect(format!("Connection timeout to {addr}"))
        })?
        .map_err(|e| {
            error!("Failed to connect to {addr}: {e}");
            ScancardError::Connect(format!("Failed to connect to {addr}: {e}"))
        })?;

    stream
        .set_nodelay(true)
        .map_err(|e| ScancardError::Connect(format!("Failed to configure socket: {e}")))?;
    Ok(stream)
}

/// Write the whole request.
pub(crate) async fn write_request(stream: &mut TcpStream, request: &[u8], timeout_duration: Duration) -> Result<()> {
    debug!("TX ({} bytes)", request.len());
    timeout(timeout_duration, stream.write_all(request))
        .await
        .map_err(|_| ScancardError::Transfer("Write timeout".to_string()))?
        .map_err(|e| {
            error!("Write failed: {e}");
            ScancardError::Transfer(format!("Write failed: {e}"))
        })?;
    Ok(())
}

/// Perform exactly one bounded read.
///
/// Returns whatever the first read delivered, which may be empty when the
/// peer closed without answering.
pub(crate) async fn read_once(stream: &mut TcpStream, max_len: usize, timeout_duration: Duration) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; max_len];
    let n = timeout(timeout_duration, stream.read(&mut buf))
        .await
        .map_err(|_| {
            error!("Read timeout after {timeout_duration:?}");
            ScancardError::Timeout(timeout_duration)
        })?
        .map_err(|e| {
            error!("Read failed: {e}");
            ScancardError::Transfer(format!("Read failed: {e}"))
        })?;

    debug!("RX ({n} bytes)");
    buf.truncate(n);
    Ok(buf)
}
