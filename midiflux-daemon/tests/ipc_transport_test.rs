// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Integration tests for the management surface's local transport (§6,
//! §13): a real `IpcServer`/`IpcClient` pair talking over a Unix-domain
//! socket, exercising the size-limit and error-code guarantees of this
//! protocol.

use midiflux_daemon::daemon::error::IpcErrorCode;
use midiflux_daemon::daemon::ipc::IpcClient;
use midiflux_daemon::daemon::types::{DaemonCommand, ManagementRequest, ManagementResponse};
use midiflux_daemon::daemon::IpcServer;
use tokio::sync::{broadcast, mpsc};

const MAX_REQUEST_SIZE: usize = 1_048_576;

/// `XDG_RUNTIME_DIR` is process-global, so the tests in this file that
/// repoint it at a private temp directory must not run concurrently with
/// each other (the test harness otherwise runs every `#[tokio::test]` on
/// its own thread in parallel by default).
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Points the management socket at a private temp directory for the
/// duration of one test, so parallel test binaries (and any real
/// `midifluxd` already running on the host) never collide on the same
/// socket path.
struct IsolatedRuntimeDir {
    _dir: tempfile::TempDir,
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl IsolatedRuntimeDir {
    fn new() -> Self {
        let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = tempfile::tempdir().expect("create temp runtime dir");
        std::env::set_var("XDG_RUNTIME_DIR", dir.path());
        IsolatedRuntimeDir { _dir: dir, _guard: guard }
    }
}

/// Answers every `ManagementRequest` on `command_rx` with a canned success
/// response carrying the request's debug representation, standing in for
/// the dispatcher's real `handle_management_request` (exercised separately
/// in `daemon::dispatcher`'s own tests).
fn spawn_echo_consumer(mut command_rx: mpsc::Receiver<DaemonCommand>) {
    tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            if let DaemonCommand::ManagementRequest { request, response_tx } = command {
                let data = serde_json::json!({ "echoed": format!("{request:?}") });
                let _ = response_tx.send(ManagementResponse::ok(data));
            }
        }
    });
}

#[tokio::test]
async fn ping_round_trips_over_the_real_socket() {
    let _isolated = IsolatedRuntimeDir::new();

    let (command_tx, command_rx) = mpsc::channel::<DaemonCommand>(16);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    spawn_echo_consumer(command_rx);

    let mut server = IpcServer::new(command_tx, shutdown_rx);
    let server_task = tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the listener a moment to bind before the client dials in.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut client = IpcClient::connect().await.expect("client connects to management socket");
    let response = client.call(ManagementRequest::Ping).await.expect("call succeeds");

    assert!(matches!(response.status, midiflux_daemon::daemon::types::ResponseStatus::Success));
    assert!(response.data.is_some());

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}

#[tokio::test]
async fn switch_profile_request_carries_its_argument_through() {
    let _isolated = IsolatedRuntimeDir::new();

    let (command_tx, command_rx) = mpsc::channel::<DaemonCommand>(16);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    spawn_echo_consumer(command_rx);

    let mut server = IpcServer::new(command_tx, shutdown_rx);
    let server_task = tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut client = IpcClient::connect().await.expect("client connects");
    let response = client
        .call(ManagementRequest::SwitchProfile { name: "studio".to_string() })
        .await
        .expect("call succeeds");

    let echoed = response.data.unwrap()["echoed"].as_str().unwrap().to_string();
    assert!(echoed.contains("studio"));

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}

#[tokio::test]
async fn oversized_request_is_rejected_with_invalid_request_code() {
    let _isolated = IsolatedRuntimeDir::new();

    let (command_tx, command_rx) = mpsc::channel::<DaemonCommand>(16);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    spawn_echo_consumer(command_rx);

    let mut server = IpcServer::new(command_tx, shutdown_rx);
    let server_task = tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut stream = tokio::net::UnixStream::connect(
        midiflux_daemon::daemon::paths::socket_path().expect("socket path resolves"),
    )
    .await
    .expect("raw connect succeeds");

    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    // A single oversized line, well past MAX_REQUEST_SIZE, with no trailing
    // valid envelope — the server must reject it without ever attempting to
    // parse it as JSON.
    let oversized = format!("{{\"id\":\"x\",\"command\":\"Ping\",\"pad\":\"{}\"}}\n", "a".repeat(MAX_REQUEST_SIZE + 1));
    stream.write_all(oversized.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let response: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["error"]["code"], IpcErrorCode::InvalidRequest.as_u16());

    let _ = shutdown_tx.send(());
    let _ = server_task.await;
}
