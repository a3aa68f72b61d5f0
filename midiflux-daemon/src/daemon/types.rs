// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Command and IPC envelope types shared between the dispatcher, the
//! profile controller, and the management surface (§6, §13).

use crate::daemon::error::IpcErrorCode;
use midiflux_core::model::DeviceIdentity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Commands that flow into the dispatcher's single `tokio::select!` loop
/// alongside normalized MIDI events, narrowed to this repository's in-scope
/// surface (no menu bar, no gamepad-specific reconnection command).
pub enum DaemonCommand {
    /// A management-surface request, answered on `response_tx`.
    ManagementRequest {
        request: ManagementRequest,
        response_tx: oneshot::Sender<ManagementResponse>,
    },
    /// The watched profile file changed on disk (§14).
    ProfileFileChanged(PathBuf),
    /// C1 raised `onConnected` for a device not currently open.
    DeviceConnected(DeviceIdentity),
    /// C1 raised `onDisconnected` for a device that was open.
    DeviceDisconnected(DeviceIdentity),
    /// An auto-release timer (§4.6, §9) fired; carries the held state key
    /// to release, routed through the dispatcher to preserve ordering.
    ReleaseFired(String),
    /// Graceful shutdown requested (Ctrl-C or management call).
    Shutdown,
}

/// One call against the abstract management surface of §6/§13.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "camelCase")]
pub enum ManagementRequest {
    Ping,
    ListProfiles,
    GetActiveProfile,
    SwitchProfile { name: String },
    ListDevices,
    ListMappings { device_name: String },
    DetectInput { seconds: u8, device_name: Option<String> },
    SupportedActionKinds,
    SupportedInputTypes,
    /// Per-event dispatch latency statistics (§4.8 "Performance telemetry").
    /// Only answered when this build enables the `diagnostics` feature.
    GetDiagnostics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

impl ManagementResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        ManagementResponse {
            status: ResponseStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(code: IpcErrorCode, message: impl Into<String>) -> Self {
        ManagementResponse {
            status: ResponseStatus::Error,
            data: None,
            error: Some(ErrorDetails {
                code: code.as_u16(),
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: u16,
    pub message: String,
}

/// Daemon lifecycle, reported by the management surface's status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    Starting,
    Running,
    ShuttingDown,
}
