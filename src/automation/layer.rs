//! Single-layer marking sequence.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::policy::PollPolicy;
use super::state::LayerState;
use crate::config::AutomationConfig;
use crate::error::{AppError, Result};
use crate::job::layer_file_path;
use crate::models::MarkParameters;
use crate::scancard::{BUSY_SENTINEL, CommandRequest, READY, Response, ScancardClient, request};

/// Outcome of one completed layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerReport {
    pub layer: u32,
    pub file: PathBuf,
    /// Working status polls issued before the scancard reported ready.
    pub poll_attempts: u32,
    pub elapsed: Duration,
}

/// Drives one layer at a time through
/// `Idle -> OpeningFile -> SettingParameters -> DownloadingParameters -> Marking -> Polling -> StoppingMark -> Done`.
///
/// Any transaction failure, poll exhaustion or cancellation ends in `Failed`.
/// The fixed settle delay between steps only gives the device time to switch
/// state; it is not an acknowledgment.
pub struct LayerAutomation {
    client: ScancardClient,
    parameters: MarkParameters,
    parameter_layer: i32,
    settle_delay: Duration,
    stop_on_failure: bool,
    policy: PollPolicy,
    cancel: CancellationToken,
    state: LayerState,
}

impl LayerAutomation {
    /// `parameters` is a snapshot; later edits by the caller are not seen.
    pub fn new(
        client: ScancardClient,
        parameters: MarkParameters,
        config: &AutomationConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            parameters,
            parameter_layer: config.parameter_layer,
            settle_delay: config.settle_delay(),
            stop_on_failure: config.stop_on_failure,
            policy: PollPolicy::from_config(config),
            cancel,
            state: LayerState::Idle,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    /// Mark `layer`, opening the file derived from `base_file`.
    ///
    /// # Errors
    /// `AppError::Scancard` for a failed transaction, `AppError::PollTimeout`
    /// when the status never reports ready, `AppError::Cancelled` when the
    /// token fires. The state is `Failed` afterwards.
    ///
    /// Cancelling through the token is the only abort path that sends the
    /// safety `stop_mark` right away. A run dropped mid-sequence (by a
    /// `timeout` or `select!` around this future) is cleaned up at the start
    /// of the next call instead.
    pub async fn run_layer(&mut self, base_file: &Path, layer: u32) -> Result<LayerReport> {
        if !self.state.is_terminal() && self.state != LayerState::Idle {
            warn!("Previous layer run was abandoned while {}", self.state);
            self.fail(layer, &AppError::Cancelled).await;
        }
        if self.state.is_terminal() {
            self.transition(LayerState::Idle);
        }

        self.client
            .console()
            .info(format!("Scancard process started for layer {layer}"));

        match self.drive(base_file, layer).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.fail(layer, &e).await;
                Err(e)
            }
        }
    }

    async fn drive(&mut self, base_file: &Path, layer: u32) -> Result<LayerReport> {
        let started = Instant::now();
        let console = self.client.console().clone();

        self.transition(LayerState::OpeningFile);
        let file = layer_file_path(base_file, layer);
        console.info(format!("Opening file {}", file.display()));
        self.step(request::open_file(&file)).await?;
        console.info(format!("File {} opened...", file.display()));
        self.pause(self.settle_delay).await?;

        self.transition(LayerState::SettingParameters);
        self.step(request::set_markparameters_by_layer(self.parameter_layer, &self.parameters))
            .await?;
        self.pause(self.settle_delay).await?;

        self.transition(LayerState::DownloadingParameters);
        self.step(request::download_parameters()).await?;
        self.pause(self.settle_delay).await?;

        self.transition(LayerState::Marking);
        self.step(request::start_mark()).await?;
        self.pause(self.settle_delay).await?;
        console.info(format!("Marking process for layer {layer} started..."));

        self.transition(LayerState::Polling);
        let poll_attempts = self.poll_until_ready(layer).await?;
        console.info(format!("Marking process for layer {layer} over"));

        self.transition(LayerState::StoppingMark);
        self.step(request::stop_mark()).await?;

        self.transition(LayerState::Done);
        Ok(LayerReport {
            layer,
            file,
            poll_attempts,
            elapsed: started.elapsed(),
        })
    }

    /// Issue `get_working_status` until it reports 0 or the policy runs out.
    ///
    /// The deadline bounds the whole polling phase, including a transaction
    /// in flight when it expires. A status read that times out counts as busy;
    /// any other failure aborts.
    async fn poll_until_ready(&self, layer: u32) -> Result<u32> {
        let mut attempts = 0;
        let outcome = match self.policy.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.poll_loop(layer, &mut attempts))
                .await
                .ok(),
            None => Some(self.poll_loop(layer, &mut attempts).await),
        };

        match outcome {
            Some(Ok(())) => Ok(attempts),
            Some(Err(e)) => Err(e),
            None => {
                debug!("Polling deadline for layer {layer} expired after {attempts} polls");
                Err(AppError::PollTimeout { layer, attempts })
            }
        }
    }

    async fn poll_loop(&self, layer: u32, attempts: &mut u32) -> Result<()> {
        let started = Instant::now();

        while self.policy.allows(*attempts, started) {
            self.pause(self.policy.interval).await?;
            *attempts += 1;

            let code = match self.send(request::get_working_status()).await? {
                Ok(response) => response.result_code(),
                Err(e) if e.is_timeout() => {
                    debug!("Status poll {attempts} for layer {layer} timed out, treating as busy");
                    BUSY_SENTINEL
                }
                Err(e) => return Err(e.into()),
            };

            debug!("Layer {layer} status poll {attempts}: {code}");
            if code == READY {
                return Ok(());
            }
        }

        Err(AppError::PollTimeout {
            layer,
            attempts: *attempts,
        })
    }

    /// Execute one step; a non-zero result code is logged but not fatal.
    async fn step(&self, request: CommandRequest) -> Result<Response> {
        let command = request.command;
        let response = self.send(request).await??;
        if let Some(code) = response.raw_result_code().filter(|code| *code != READY) {
            warn!("{command} returned result code {code}");
        }
        Ok(response)
    }

    /// Execute a transaction unless cancelled first. Cancelling drops the socket.
    async fn send(&self, request: CommandRequest) -> Result<crate::scancard::Result<Response>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            outcome = self.client.execute(&request) => Ok(outcome),
        }
    }

    async fn pause(&self, duration: Duration) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    async fn fail(&mut self, layer: u32, error: &AppError) {
        let console = self.client.console().clone();

        if self.stop_on_failure && self.state.marking_started() && self.state != LayerState::StoppingMark {
            console.warn(format!("Layer {layer} failed while {}, sending stop_mark", self.state));
            if let Err(e) = self.client.stop_mark().await {
                warn!("Safety stop for layer {layer} failed: {e}");
            }
        }

        console.error(format!("Layer {layer} failed while {}: {error}", self.state));
        self.transition(LayerState::Failed);
    }

    fn transition(&mut self, next: LayerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid layer transition {} -> {next}",
            self.state
        );
        debug!("Layer state {} -> {next}", self.state);
        self.state = next;
    }
}
