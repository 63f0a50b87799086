//! Request payloads and one builder per scancard command.
//!
//! Builders are pure: they read the parameter snapshot they are given and
//! return a fresh request.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::SESSION_ID;
use crate::models::MarkParameters;

/// Device operation selected by the `cmd` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    GetWorkingStatus,
    SetMarkparametersByIndex,
    SetMarkparametersByLayer,
    GetMarkparametersByIndex,
    GetMarkparametersByLayer,
    OpenFile,
    CloseFile,
    StartMark,
    StopMark,
    DownloadParameters,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::GetWorkingStatus,
        Command::SetMarkparametersByIndex,
        Command::SetMarkparametersByLayer,
        Command::GetMarkparametersByIndex,
        Command::GetMarkparametersByLayer,
        Command::OpenFile,
        Command::CloseFile,
        Command::StartMark,
        Command::StopMark,
        Command::DownloadParameters,
    ];

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetWorkingStatus => "get_working_status",
            Command::SetMarkparametersByIndex => "set_markparameters_by_index",
            Command::SetMarkparametersByLayer => "set_markparameters_by_layer",
            Command::GetMarkparametersByIndex => "get_markparameters_by_index",
            Command::GetMarkparametersByLayer => "get_markparameters_by_layer",
            Command::OpenFile => "open_file",
            Command::CloseFile => "close_file",
            Command::StartMark => "start_mark",
            Command::StopMark => "stop_mark",
            Command::DownloadParameters => "download_parameters",
        }
    }

    /// Human-readable label used as the prefix of every log line.
    pub fn action(&self) -> &'static str {
        match self {
            Command::GetWorkingStatus => "Getting working status",
            Command::SetMarkparametersByIndex => "Setting mark parameters by index",
            Command::SetMarkparametersByLayer => "Setting mark parameters by layer",
            Command::GetMarkparametersByIndex => "Getting mark parameters by index",
            Command::GetMarkparametersByLayer => "Getting mark parameters by layer",
            Command::OpenFile => "Opening file",
            Command::CloseFile => "Closing file",
            Command::StartMark => "Start marking",
            Command::StopMark => "Stop marking",
            Command::DownloadParameters => "Downloading parameters",
        }
    }

    /// Whether the command changes device state.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            Command::GetWorkingStatus | Command::GetMarkparametersByIndex | Command::GetMarkparametersByLayer
        )
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters addressed by outer/inner index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersByIndex {
    pub index: i32,
    pub in_index: i32,
    #[serde(flatten)]
    pub parameters: MarkParameters,
}

/// Parameters addressed by layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersByLayer {
    pub layer: i32,
    #[serde(flatten)]
    pub parameters: MarkParameters,
}

/// Probe arguments for reading parameters by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProbe {
    pub index: i32,
    pub in_index: i32,
}

/// Probe argument for reading parameters by layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerProbe {
    pub layer_id: i32,
}

/// Job file to open on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
}

/// Command-specific `data` object.
///
/// Variants are distinguished by shape; the parameter-carrying variants come
/// first so the probes never swallow a full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestData {
    ParametersByIndex(ParametersByIndex),
    ParametersByLayer(ParametersByLayer),
    IndexProbe(IndexProbe),
    LayerProbe(LayerProbe),
    File(FileRef),
}

/// One request as sent on the wire: `{"sid": 0, "cmd": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(rename = "sid")]
    pub session_id: u32,
    #[serde(rename = "cmd")]
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RequestData>,
}

impl CommandRequest {
    fn new(command: Command, data: Option<RequestData>) -> Self {
        Self {
            session_id: SESSION_ID,
            command,
            data,
        }
    }

    /// Serialize to the JSON text written to the socket.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub fn get_working_status() -> CommandRequest {
    CommandRequest::new(Command::GetWorkingStatus, None)
}

pub fn set_markparameters_by_index(index: i32, in_index: i32, parameters: &MarkParameters) -> CommandRequest {
    CommandRequest::new(
        Command::SetMarkparametersByIndex,
        Some(RequestData::ParametersByIndex(ParametersByIndex {
            index,
            in_index,
            parameters: *parameters,
        })),
    )
}

pub fn set_markparameters_by_layer(layer: i32, parameters: &MarkParameters) -> CommandRequest {
    CommandRequest::new(
        Command::SetMarkparametersByLayer,
        Some(RequestData::ParametersByLayer(ParametersByLayer {
            layer,
            parameters: *parameters,
        })),
    )
}

/// Reads the active parameter set (index 0, every inner index).
pub fn get_markparameters_by_index() -> CommandRequest {
    CommandRequest::new(
        Command::GetMarkparametersByIndex,
        Some(RequestData::IndexProbe(IndexProbe { index: 0, in_index: -1 })),
    )
}

/// Reads the active parameter set of layer 0.
pub fn get_markparameters_by_layer() -> CommandRequest {
    CommandRequest::new(
        Command::GetMarkparametersByLayer,
        Some(RequestData::LayerProbe(LayerProbe { layer_id: 0 })),
    )
}

pub fn open_file(path: &Path) -> CommandRequest {
    CommandRequest::new(
        Command::OpenFile,
        Some(RequestData::File(FileRef {
            path: path.to_string_lossy().into_owned(),
        })),
    )
}

pub fn close_file() -> CommandRequest {
    CommandRequest::new(Command::CloseFile, None)
}

pub fn start_mark() -> CommandRequest {
    CommandRequest::new(Command::StartMark, None)
}

pub fn stop_mark() -> CommandRequest {
    CommandRequest::new(Command::StopMark, None)
}

/// Must follow every parameter update before it takes effect.
pub fn download_parameters() -> CommandRequest {
    CommandRequest::new(Command::DownloadParameters, None)
}
