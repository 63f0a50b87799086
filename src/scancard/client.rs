//! ScancardClient struct and public API.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::error::{Result, ScancardError};
use super::io::{connect, read_once, write_request};
use super::request::{self, CommandRequest};
use super::response::Response;
use crate::config::ScancardConfig;
use crate::console::Console;
use crate::error::AppError;
use crate::models::MarkParameters;

/// Smallest transaction timeout a client will use.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Client for the scancard JSON command service.
///
/// Every call is one transaction on its own connection: connect, send, one
/// bounded read, decode. The socket is owned by the call and dropped on every
/// exit path, so nothing is reused between commands.
#[derive(Debug, Clone)]
pub struct ScancardClient {
    addr: String,
    timeout_duration: Duration,
    recv_buffer: usize,
    console: Console,
}

impl ScancardClient {
    /// Create a client from the host context.
    ///
    /// # Errors
    /// Returns `AppError::Initialization` when the host, port, timeout or
    /// receive buffer is missing.
    pub fn new(config: &ScancardConfig, console: Console) -> std::result::Result<Self, AppError> {
        if config.host.trim().is_empty() {
            return Err(AppError::initialization("scancard host is not set"));
        }
        if config.port == 0 {
            return Err(AppError::initialization("scancard port is not set"));
        }
        if config.timeout_secs == 0 {
            return Err(AppError::initialization("timeout must be greater than 0 seconds"));
        }
        if config.recv_buffer_bytes == 0 {
            return Err(AppError::initialization("receive buffer must not be empty"));
        }

        Ok(Self {
            addr: config.address(),
            timeout_duration: config.timeout(),
            recv_buffer: config.recv_buffer_bytes,
            console,
        })
    }

    /// Override the transaction timeout. A zero duration is raised to
    /// [`MIN_TIMEOUT`] so reads are never abandoned before they start.
    pub fn with_timeout(mut self, timeout_duration: Duration) -> Self {
        self.timeout_duration = timeout_duration.max(MIN_TIMEOUT);
        self
    }

    pub fn address(&self) -> &str {
        &self.addr
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_duration
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Execute one request/response exchange.
    ///
    /// Emits a "connecting", a "sending" and a "received" or "failed" event.
    /// No retry is attempted.
    pub async fn execute(&self, request: &CommandRequest) -> Result<Response> {
        let action = request.command.action();
        let outcome = self.transact(request).await;

        match &outcome {
            Ok(response) => {
                if request.command.is_mutating() {
                    info!("{} acknowledged with 'ret' {:?}", request.command, response.raw_result_code());
                } else {
                    debug!("Extracted 'ret' value: {:?}", response.raw_result_code());
                }
                self.console.info(format!(
                    "{action}-> Response received from {} - {}",
                    self.addr,
                    response.pretty()
                ));
            }
            Err(e) => {
                self.console
                    .error(format!("{} - {action} not successful - {e}", e.code()));
            }
        }

        outcome
    }

    async fn transact(&self, request: &CommandRequest) -> Result<Response> {
        let action = request.command.action();
        let json = request
            .to_json()
            .map_err(|e| ScancardError::Transfer(format!("Failed to serialize request: {e}")))?;

        self.console
            .info(format!("{action}-> Connecting to {}...", self.addr));
        let mut stream = connect(&self.addr, self.timeout_duration).await?;

        self.console.info(format!(
            "{action}-> Sending {json} to {} with timeout of {}s",
            self.addr,
            self.timeout_duration.as_secs_f64()
        ));
        write_request(&mut stream, json.as_bytes(), self.timeout_duration).await?;

        let bytes = read_once(&mut stream, self.recv_buffer, self.timeout_duration).await?;
        Response::from_bytes(&bytes)
    }

    pub async fn get_working_status(&self) -> Result<Response> {
        self.execute(&request::get_working_status()).await
    }

    pub async fn set_markparameters_by_index(
        &self,
        index: i32,
        in_index: i32,
        parameters: &MarkParameters,
    ) -> Result<Response> {
        self.execute(&request::set_markparameters_by_index(index, in_index, parameters))
            .await
    }

    pub async fn set_markparameters_by_layer(&self, layer: i32, parameters: &MarkParameters) -> Result<Response> {
        self.execute(&request::set_markparameters_by_layer(layer, parameters))
            .await
    }

    pub async fn get_markparameters_by_index(&self) -> Result<Response> {
        self.execute(&request::get_markparameters_by_index()).await
    }

    pub async fn get_markparameters_by_layer(&self) -> Result<Response> {
        self.execute(&request::get_markparameters_by_layer()).await
    }

    pub async fn open_file(&self, path: &Path) -> Result<Response> {
        let response = self.execute(&request::open_file(path)).await?;
        info!("File {} opened", path.display());
        Ok(response)
    }

    pub async fn close_file(&self) -> Result<Response> {
        self.execute(&request::close_file()).await
    }

    pub async fn start_mark(&self) -> Result<Response> {
        self.execute(&request::start_mark()).await
    }

    pub async fn stop_mark(&self) -> Result<Response> {
        self.execute(&request::stop_mark()).await
    }

    pub async fn download_parameters(&self) -> Result<Response> {
        self.execute(&request::download_parameters()).await
    }

    /// Check that the scancard answers. Returns detailed status info.
    pub async fn diagnose(&self) -> ConnectionDiagnosis {
        let start = Instant::now();
        let tcp_result = connect(&self.addr, self.timeout_duration).await;
        let tcp_connect_ms = start.elapsed().as_millis() as u64;

        let probe = match tcp_result {
            Ok(stream) => stream,
            Err(e) => {
                return ConnectionDiagnosis {
                    address: self.addr.clone(),
                    tcp_reachable: false,
                    tcp_connect_ms,
                    tcp_error: Some(e.to_string()),
                    protocol_ok: false,
                    protocol_error: None,
                    result_code: None,
                };
            }
        };
        // Release the probe socket before the status transaction opens its own.
        drop(probe);

        debug!("TCP probe to {} took {tcp_connect_ms}ms", self.addr);

        match self.get_working_status().await {
            Ok(response) => ConnectionDiagnosis {
                address: self.addr.clone(),
                tcp_reachable: true,
                tcp_connect_ms,
                tcp_error: None,
                protocol_ok: true,
                protocol_error: None,
                result_code: Some(response.result_code()),
            },
            Err(e) => ConnectionDiagnosis {
                address: self.addr.clone(),
                tcp_reachable: true,
                tcp_connect_ms,
                tcp_error: None,
                protocol_ok: false,
                protocol_error: Some(format!("{} - {e}", e.code())),
                result_code: None,
            },
        }
    }
}

/// Diagnostic information about a connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectionDiagnosis {
    pub address: String,
    /// Whether the TCP port was reachable
    pub tcp_reachable: bool,
    /// Time to establish the TCP connection (ms)
    pub tcp_connect_ms: u64,
    /// TCP-level error if any
    pub tcp_error: Option<String>,
    /// Whether a working status request got a decodable answer
    pub protocol_ok: bool,
    /// Protocol-level error if any
    pub protocol_error: Option<String>,
    /// Result code of the working status request
    pub result_code: Option<i64>,
}

impl std::fmt::Display for ConnectionDiagnosis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Scancard Diagnosis ({}) ===", self.address)?;
        writeln!(f, "TCP Reachable: {}", self.tcp_reachable)?;
        writeln!(f, "TCP Connect Time: {}ms", self.tcp_connect_ms)?;

        if let Some(ref err) = self.tcp_error {
            writeln!(f, "TCP Error: {err}")?;
        }

        if self.tcp_reachable {
            writeln!(f, "Protocol OK: {}", self.protocol_ok)?;
            if let Some(ref err) = self.protocol_error {
                writeln!(f, "Protocol Error: {err}")?;
            }
            if let Some(code) = self.result_code {
                let state = if code == super::types::READY { "ready" } else { "busy" };
                writeln!(f, "Working Status: {code} ({state})")?;
            }
        }

        Ok(())
    }
}
