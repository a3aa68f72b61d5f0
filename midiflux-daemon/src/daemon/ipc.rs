// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! The management surface's local transport (§6, §13): a Unix-domain
//! socket carrying newline-delimited JSON request/response envelopes over
//! the `ManagementRequest`/`ManagementResponse` vocabulary of this
//! repository. The socket itself and its directory are created with
//! owner-only permissions.
//!
//! Protocol: one envelope per line.
//! - Request: `{"id": "...", "command": "...", "args": {...}}\n`
//! - Response: `{"id": "...", "status": "...", "data": {...}}\n`

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::daemon::error::{DaemonError, IpcErrorCode, Result};
use crate::daemon::paths::socket_path;
use crate::daemon::types::{DaemonCommand, ManagementRequest, ManagementResponse};

/// Requests above this size are rejected before parsing, to bound memory
/// use against a misbehaving or hostile local client (§13).
const MAX_REQUEST_SIZE: usize = 1_048_576;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RequestEnvelope {
    id: String,
    #[serde(flatten)]
    request: ManagementRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseEnvelope {
    id: String,
    #[serde(flatten)]
    response: ManagementResponse,
}

/// Accepts connections on the management socket and forwards each request
/// onto the dispatcher's command channel as a
/// [`DaemonCommand::ManagementRequest`], preserving the one-writer rule of
/// §5 — this task never touches the registry, state, or sinks directly.
pub struct IpcServer {
    command_tx: mpsc::Sender<DaemonCommand>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl IpcServer {
    pub fn new(command_tx: mpsc::Sender<DaemonCommand>, shutdown_rx: broadcast::Receiver<()>) -> Self {
        IpcServer { command_tx, shutdown_rx }
    }

    #[cfg(unix)]
    pub async fn run(&mut self) -> Result<()> {
        use tokio::net::UnixListener;

        let path = socket_path()?;
        let _ = tokio::fs::remove_file(&path).await;

        let listener = UnixListener::bind(&path)
            .map_err(|e| DaemonError::Ipc(format!("failed to bind management socket: {e}")))?;

        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                if let Err(e) = tokio::fs::set_permissions(&path, perms).await {
                    warn!(error = %e, "failed to tighten management socket permissions");
                }
            }
        }

        info!(?path, "management surface listening");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let command_tx = self.command_tx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, command_tx).await {
                                    error!(error = %e, "management client handler failed");
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "failed to accept management connection"),
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("management surface shutting down");
                    break;
                }
            }
        }

        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    #[cfg(not(unix))]
    pub async fn run(&mut self) -> Result<()> {
        Err(DaemonError::Ipc(
            "management surface transport is only implemented on unix targets in this build".into(),
        ))
    }
}

#[cfg(unix)]
async fn handle_client(stream: tokio::net::UnixStream, command_tx: mpsc::Sender<DaemonCommand>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        // Bound the read itself rather than checking `line.len()` after the
        // fact — `read_line` otherwise buffers an unbounded amount of input
        // from a client that never sends a newline before the size check
        // ever runs.
        let n = (&mut reader).take(MAX_REQUEST_SIZE as u64 + 1).read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        if line.len() as u64 > MAX_REQUEST_SIZE as u64 {
            warn!(bytes = line.len(), "rejected oversized management request");
            let response = error_envelope("unknown", IpcErrorCode::InvalidRequest, "request exceeds 1MB limit");
            send(&mut writer, &response).await?;
            // The rest of this oversized line is still sitting unread on the
            // socket; framing can't be trusted to resync, so close instead
            // of looping back into read_line.
            break;
        }

        let envelope: RequestEnvelope = match serde_json::from_str(line.trim()) {
            Ok(envelope) => envelope,
            Err(e) => {
                let response = error_envelope("unknown", IpcErrorCode::InvalidJson, &e.to_string());
                send(&mut writer, &response).await?;
                continue;
            }
        };

        debug!(id = %envelope.id, "received management request");

        let (response_tx, response_rx) = oneshot::channel();
        if command_tx
            .send(DaemonCommand::ManagementRequest {
                request: envelope.request,
                response_tx,
            })
            .await
            .is_err()
        {
            let response = error_envelope(&envelope.id, IpcErrorCode::InternalError, "dispatcher is not accepting commands");
            send(&mut writer, &response).await?;
            break;
        }

        let response = match tokio::time::timeout(REQUEST_TIMEOUT, response_rx).await {
            Ok(Ok(response)) => ResponseEnvelope { id: envelope.id, response },
            Ok(Err(_)) => error_envelope(&envelope.id, IpcErrorCode::InternalError, "response channel closed"),
            Err(_) => error_envelope(&envelope.id, IpcErrorCode::Timeout, "request timed out"),
        };
        send(&mut writer, &response).await?;
    }

    Ok(())
}

fn error_envelope(id: &str, code: IpcErrorCode, message: &str) -> ResponseEnvelope {
    ResponseEnvelope {
        id: id.to_string(),
        response: ManagementResponse::fail(code, message),
    }
}

#[cfg(unix)]
async fn send(writer: &mut tokio::net::unix::OwnedWriteHalf, response: &ResponseEnvelope) -> Result<()> {
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Thin client used by `midifluxctl` and tests to call the management
/// surface without depending on its transport details.
#[cfg(unix)]
pub struct IpcClient {
    stream: tokio::net::UnixStream,
}

#[cfg(unix)]
impl IpcClient {
    pub async fn connect() -> Result<Self> {
        let path = socket_path()?;
        let stream = tokio::net::UnixStream::connect(&path)
            .await
            .map_err(|e| DaemonError::Ipc(format!("failed to connect to {path:?}: {e}")))?;
        Ok(IpcClient { stream })
    }

    pub async fn call(&mut self, request: ManagementRequest) -> Result<ManagementResponse> {
        let envelope = RequestEnvelope {
            id: uuid::Uuid::new_v4().to_string(),
            request,
        };
        let json = serde_json::to_string(&envelope)?;
        self.stream.write_all(json.as_bytes()).await?;
        self.stream.write_all(b"\n").await?;
        self.stream.flush().await?;

        let mut reader = BufReader::new(&mut self.stream);
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let response: ResponseEnvelope = serde_json::from_str(&line)?;
        Ok(response.response)
    }
}
