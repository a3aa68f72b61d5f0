// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Dispatcher (C8): the single `tokio::select!` event loop that owns
//! registry publication, state writes, and action execution.

use std::path::PathBuf;
use std::sync::Arc;
#[cfg(feature = "diagnostics")]
use std::time::Instant;
use std::time::Duration;

use midiflux_core::action::ExecutionContext;
use midiflux_core::midi::{Channel, InputType, MidiEvent};
use midiflux_core::model::DeviceIdentity;
use midiflux_core::registry::RegistryHandle;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

#[cfg(feature = "diagnostics")]
use crate::daemon::diagnostics::LatencySampler;
use crate::daemon::error::IpcErrorCode;
use crate::daemon::profile_controller::{read_profile_file, ProfileController};
use crate::daemon::types::{DaemonCommand, ManagementRequest, ManagementResponse};
use crate::sinks::midi::{DeviceConnectionEvent, MidiInputHub};

/// Dispatch-latency samples above this are counted in diagnostics (§4.8).
#[cfg(feature = "diagnostics")]
const LATENCY_WARN_THRESHOLD: Duration = Duration::from_millis(5);

/// Bound on how many raw events the detect-input broadcast channel holds
/// before a slow subscriber starts missing events; detection is advisory,
/// not a guaranteed capture.
const DETECT_CHANNEL_CAPACITY: usize = 256;

pub struct Dispatcher {
    profile: ProfileController,
    ctx: ExecutionContext,
    registry: Arc<RegistryHandle>,
    midi_hub: Arc<MidiInputHub>,
    event_rx: mpsc::Receiver<(DeviceIdentity, MidiEvent)>,
    connection_rx: mpsc::Receiver<DeviceConnectionEvent>,
    command_rx: mpsc::Receiver<DaemonCommand>,
    command_tx: mpsc::Sender<DaemonCommand>,
    detect_tx: broadcast::Sender<(DeviceIdentity, MidiEvent)>,
    profiles_dir: PathBuf,
    #[cfg(feature = "diagnostics")]
    latency: LatencySampler,
    shutdown: bool,
}

impl Dispatcher {
    pub fn new(
        ctx: ExecutionContext,
        registry: Arc<RegistryHandle>,
        profiles_dir: PathBuf,
        command_rx: mpsc::Receiver<DaemonCommand>,
        command_tx: mpsc::Sender<DaemonCommand>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (connection_tx, connection_rx) = mpsc::channel(32);
        let midi_hub = Arc::new(MidiInputHub::new(event_tx, connection_tx));
        midi_hub.spawn_hotplug_poller();

        let (detect_tx, _detect_rx) = broadcast::channel(DETECT_CHANNEL_CAPACITY);

        Dispatcher {
            profile: ProfileController::new(Arc::clone(&registry), ctx.clone(), Arc::clone(&midi_hub)),
            ctx,
            registry,
            midi_hub,
            event_rx,
            connection_rx,
            command_rx,
            command_tx,
            detect_tx,
            profiles_dir,
            #[cfg(feature = "diagnostics")]
            latency: LatencySampler::new(LATENCY_WARN_THRESHOLD),
            shutdown: false,
        }
    }

    pub fn midi_hub(&self) -> Arc<MidiInputHub> {
        Arc::clone(&self.midi_hub)
    }

    /// A clone of the command channel sender, for components spawned outside
    /// the dispatcher (release scheduler, profile watcher, IPC server) that
    /// need to enqueue `DaemonCommand`s onto this loop.
    pub fn command_sender(&self) -> mpsc::Sender<DaemonCommand> {
        self.command_tx.clone()
    }

    /// Load the named profile from the profiles directory as the initial
    /// active profile, before entering `run`.
    pub async fn load_initial_profile(&mut self, name: &str) -> Result<(), String> {
        let path = self.profiles_dir.join(format!("{name}.json"));
        let json = read_profile_file(&path).await.map_err(|e| e.to_string())?;
        self.profile.load(&json).await.map_err(|e| e.to_string())
    }

    pub async fn run(mut self) {
        info!("dispatcher starting");
        while !self.shutdown {
            tokio::select! {
                Some((identity, event)) = self.event_rx.recv() => {
                    let _ = self.detect_tx.send((identity.clone(), event.clone()));
                    self.handle_midi_event(&identity, event).await;
                }
                Some(conn_event) = self.connection_rx.recv() => {
                    self.handle_connection_event(conn_event);
                }
                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command).await;
                }
                else => {
                    info!("all dispatcher channels closed");
                    break;
                }
            }
        }
        self.shut_down().await;
        info!("dispatcher stopped");
    }

    /// Normalize, look up, and execute (§4.8 steps 1-3). CC events resolve
    /// Absolute vs Relative via `lookup_control_change` since the wire bytes
    /// alone don't carry that distinction; every other kind uses the plain
    /// four-tier `lookup`.
    async fn handle_midi_event(&mut self, identity: &DeviceIdentity, event: MidiEvent) {
        #[cfg(feature = "diagnostics")]
        let start = Instant::now();
        let registry = self.registry.load();
        let channel = event.channel;

        let mappings: Vec<_> = if event.kind.is_control_change() {
            match event.number {
                Some(number) => {
                    let (_, hits) = registry.lookup_control_change(&identity.name, channel, number);
                    hits.to_vec()
                }
                None => Vec::new(),
            }
        } else {
            registry
                .lookup(&identity.name, channel, event.kind, event.number)
                .to_vec()
        };

        if mappings.is_empty() {
            #[cfg(feature = "diagnostics")]
            self.latency.record(start.elapsed());
            return;
        }

        // The raw wire value is passed straight through: `RelativeCc`
        // actions decode the sign-magnitude delta themselves, and fixed
        // triggers ignore the value entirely.
        let value = event.value.map(|v| v as i32);

        for mapping in &mappings {
            if mapping.action.requires_async() {
                let ctx = self.ctx.clone();
                let action = mapping.action.clone();
                tokio::spawn(async move {
                    if let Err(e) = action.execute_async(&ctx, value).await {
                        warn!(error = %e, "async action execution failed");
                    }
                });
            } else if let Err(e) = mapping.action.execute(&self.ctx, value) {
                warn!(error = %e, "action execution failed");
            }
        }

        #[cfg(feature = "diagnostics")]
        self.latency.record(start.elapsed());
    }

    fn handle_connection_event(&mut self, event: DeviceConnectionEvent) {
        match event {
            DeviceConnectionEvent::Connected(identity) => {
                debug!(device = %identity.name, "device connected");
                self.profile.on_device_connected(&identity.name);
            }
            DeviceConnectionEvent::Disconnected(identity) => {
                debug!(device = %identity.name, "device disconnected");
                self.profile.on_device_disconnected(&identity.name);
            }
        }
    }

    async fn handle_command(&mut self, command: DaemonCommand) {
        match command {
            DaemonCommand::ManagementRequest { request, response_tx } => match request {
                // `DetectInput` blocks on a capture window of up to 20s; it
                // must not be awaited inline here, or this select loop stops
                // draining `event_rx` into `detect_tx` for the whole window
                // and every capture observes nothing. Subscribe on the
                // dispatch thread (so the window starts now, not whenever a
                // spawned task gets scheduled) and let the collection itself
                // run off to the side.
                ManagementRequest::DetectInput { seconds, device_name } => {
                    let rx = self.detect_tx.subscribe();
                    tokio::spawn(async move {
                        let response = collect_detected_input(rx, seconds, device_name).await;
                        let _ = response_tx.send(response);
                    });
                }
                other => {
                    let response = self.handle_management_request(other).await;
                    let _ = response_tx.send(response);
                }
            },
            DaemonCommand::ProfileFileChanged(path) => {
                info!(?path, "profile file changed, reloading");
                match read_profile_file(&path).await {
                    Ok(json) => {
                        if let Err(e) = self.profile.load(&json).await {
                            error!(error = %e, "profile reload failed; previous profile retained");
                        }
                    }
                    Err(e) => error!(error = %e, "failed to read changed profile file"),
                }
            }
            DaemonCommand::DeviceConnected(identity) => {
                self.profile.on_device_connected(&identity.name);
            }
            DaemonCommand::DeviceDisconnected(identity) => {
                self.profile.on_device_disconnected(&identity.name);
            }
            DaemonCommand::ReleaseFired(held_key) => {
                // A late auto-release firing after the key was already
                // released (explicit KeyUp, profile swap, shutdown) is a
                // no-op (§4.6): nothing left in the held set to release.
                if self.ctx.state.is_held(&held_key) {
                    midiflux_core::action::release_held_resource(&self.ctx, &held_key).await;
                }
            }
            DaemonCommand::Shutdown => {
                self.shutdown = true;
            }
        }
    }

    async fn handle_management_request(&mut self, request: ManagementRequest) -> ManagementResponse {
        match request {
            ManagementRequest::Ping => ManagementResponse::ok(json!({"message": "pong"})),
            ManagementRequest::GetActiveProfile => {
                ManagementResponse::ok(json!({"profileName": self.profile.current_profile_name()}))
            }
            ManagementRequest::ListProfiles => match list_profile_names(&self.profiles_dir).await {
                Ok(names) => ManagementResponse::ok(json!({"profiles": names})),
                Err(e) => ManagementResponse::fail(IpcErrorCode::ConfigNotFound, e.to_string()),
            },
            ManagementRequest::SwitchProfile { name } => self.switch_profile(&name).await,
            ManagementRequest::ListDevices => match MidiInputHub::list_input_devices() {
                Ok(devices) => {
                    let names: Vec<String> = devices.into_iter().map(|d| d.name).collect();
                    ManagementResponse::ok(json!({"devices": names}))
                }
                Err(e) => ManagementResponse::fail(IpcErrorCode::DeviceNotConnected, e.to_string()),
            },
            ManagementRequest::ListMappings { device_name } => {
                let mappings: Vec<serde_json::Value> = self
                    .profile
                    .current_profile()
                    .devices
                    .iter()
                    .filter(|d| d.device_name.matches(&device_name))
                    .flat_map(|d| d.mappings.iter())
                    .map(|m| json!({"id": m.id, "description": m.description, "enabled": m.enabled}))
                    .collect();
                ManagementResponse::ok(json!({"mappings": mappings}))
            }
            ManagementRequest::DetectInput { .. } => {
                unreachable!("DetectInput is intercepted in handle_command before reaching here")
            }
            ManagementRequest::SupportedActionKinds => {
                ManagementResponse::ok(json!({"kinds": midiflux_core::config::supported_action_kinds()}))
            }
            ManagementRequest::SupportedInputTypes => {
                ManagementResponse::ok(json!({"types": midiflux_core::config::supported_input_types()}))
            }
            ManagementRequest::GetDiagnostics => self.diagnostics_response(),
        }
    }

    #[cfg(feature = "diagnostics")]
    fn diagnostics_response(&self) -> ManagementResponse {
        ManagementResponse::ok(json!(self.latency.stats()))
    }

    #[cfg(not(feature = "diagnostics"))]
    fn diagnostics_response(&self) -> ManagementResponse {
        ManagementResponse::fail(
            IpcErrorCode::InvalidRequest,
            "this build was not compiled with the diagnostics feature",
        )
    }

    async fn switch_profile(&mut self, name: &str) -> ManagementResponse {
        let path = self.profiles_dir.join(format!("{name}.json"));
        let json = match read_profile_file(&path).await {
            Ok(j) => j,
            Err(e) => return ManagementResponse::fail(IpcErrorCode::ConfigNotFound, e.to_string()),
        };
        match self.profile.load(&json).await {
            Ok(()) => {
                if let Err(e) = crate::daemon::paths::write_last_profile(name).await {
                    warn!(error = %e, "failed to persist last-used profile pointer");
                }
                ManagementResponse::ok(json!({"profileName": name}))
            }
            Err(e) => ManagementResponse::fail(IpcErrorCode::ConfigValidationFailed, e.to_string()),
        }
    }

    /// Releases every still-held resource (pressed key, pressed gamepad
    /// button) for real before the process exits (§4.8 "release all held
    /// resources via C6", §4.6).
    async fn shut_down(&mut self) {
        for key in self.ctx.state.held_keys() {
            midiflux_core::action::release_held_resource(&self.ctx, &key).await;
        }
    }
}

/// Capture raw, unfiltered MIDI events for `seconds` (1..20), optionally
/// restricted to one device, and return them (§6 "Detect input"). Runs as
/// its own spawned task against a pre-subscribed receiver, off the dispatch
/// thread, so the capture window doesn't stall event processing.
async fn collect_detected_input(
    mut rx: broadcast::Receiver<(DeviceIdentity, MidiEvent)>,
    seconds: u8,
    device_name: Option<String>,
) -> ManagementResponse {
    let seconds = seconds.clamp(1, 20);
    let mut observed = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds as u64);

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok((identity, event))) => {
                let matches_filter = match device_name.as_deref() {
                    Some(name) => name == identity.name,
                    None => true,
                };
                if matches_filter {
                    observed.push(json!({
                        "device": identity.name,
                        "inputType": format!("{:?}", event.kind),
                        "channel": format!("{:?}", event.channel),
                        "number": event.number,
                        "value": event.value,
                    }));
                }
            }
            Ok(Err(_)) | Err(_) => break,
        }
    }

    ManagementResponse::ok(json!({"events": observed}))
}

async fn list_profile_names(dir: &PathBuf) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_type_not_implementing_copy_is_still_clonable_via_vec() {
        // Guards the `hits.to_vec()` pattern in `handle_midi_event`: the
        // registry hands back `&[Arc<ActionMapping>]`, and `Arc` clones are
        // cheap regardless of what `ActionMapping` itself derives.
        let a: Arc<i32> = Arc::new(1);
        let v: Vec<Arc<i32>> = [&a][..].iter().map(|x| Arc::clone(x)).collect();
        assert_eq!(*v[0], 1);
    }

    fn test_event(value: Option<u8>) -> (DeviceIdentity, MidiEvent) {
        (
            DeviceIdentity { id: "dev-1".to_string(), name: "Launchpad".to_string() },
            MidiEvent { kind: InputType::NoteOn, channel: Channel::Exact(1), number: Some(60), value },
        )
    }

    // Regression test for the starvation bug: a capture subscribed before the
    // events arrive must observe them, proving the broadcast fan-out works
    // independently of whatever is doing the awaiting.
    #[tokio::test]
    async fn detect_input_observes_events_sent_after_subscription() {
        let (tx, _keep_alive) = broadcast::channel(DETECT_CHANNEL_CAPACITY);
        let rx = tx.subscribe();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(test_event(Some(100)));
        });

        let response = collect_detected_input(rx, 1, None).await;
        let events = response.data.expect("ok response carries data");
        let events = events["events"].as_array().expect("events is an array");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["device"], "Launchpad");
    }

    #[tokio::test]
    async fn detect_input_filters_by_device_name() {
        let (tx, _keep_alive) = broadcast::channel(DETECT_CHANNEL_CAPACITY);
        let rx = tx.subscribe();

        let other = (
            DeviceIdentity { id: "dev-2".to_string(), name: "Other".to_string() },
            test_event(Some(1)).1,
        );
        let mine = test_event(Some(2));

        tokio::spawn(async move {
            let _ = tx.send(other);
            let _ = tx.send(mine);
        });

        let response = collect_detected_input(rx, 1, Some("Launchpad".to_string())).await;
        let events = response.data.expect("ok response carries data");
        let events = events["events"].as_array().expect("events is an array");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["device"], "Launchpad");
    }
}
