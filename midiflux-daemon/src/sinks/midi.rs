// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! MIDI input/output (C1, C10): a `midir`-backed, multi-device hub. `midir`
//! has no async notification for hot-plug, so device connect/disconnect is
//! detected by polling `ports()` against the currently-open set on a fixed
//! interval (§14 "Hot-plug device reconciliation").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use midi_msg::MidiMsg;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use midiflux_core::action::MidiOutputSink;
use midiflux_core::error::ActionError;
use midiflux_core::midi::MidiEvent;
use midiflux_core::model::DeviceIdentity;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// How often the hot-plug poller compares `MidiInput::ports()` against the
/// currently-open device set.
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

struct OpenInput {
    identity: DeviceIdentity,
    _connection: MidiInputConnection<()>,
}

/// Multi-device MIDI input hub (C1). Owns every currently-open input
/// connection and emits normalized [`MidiEvent`]s plus connect/disconnect
/// notifications onto a single channel, fanned out across however many
/// devices the active profile wants open.
pub struct MidiInputHub {
    open: Arc<Mutex<HashMap<String, OpenInput>>>,
    event_tx: mpsc::Sender<(DeviceIdentity, MidiEvent)>,
    connection_tx: mpsc::Sender<DeviceConnectionEvent>,
}

#[derive(Debug, Clone)]
pub enum DeviceConnectionEvent {
    Connected(DeviceIdentity),
    Disconnected(DeviceIdentity),
}

impl MidiInputHub {
    pub fn new(
        event_tx: mpsc::Sender<(DeviceIdentity, MidiEvent)>,
        connection_tx: mpsc::Sender<DeviceConnectionEvent>,
    ) -> Self {
        MidiInputHub {
            open: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
            connection_tx,
        }
    }

    /// Enumerate every currently visible MIDI input device.
    pub fn list_input_devices() -> Result<Vec<DeviceIdentity>, ActionError> {
        let midi_in = MidiInput::new("midiflux-probe")
            .map_err(|e| ActionError::SinkUnavailable(format!("failed to open MIDI input: {e}")))?;
        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .map(|(i, port)| {
                let name = midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Port {i}"));
                DeviceIdentity {
                    id: format!("in:{i}"),
                    name,
                }
            })
            .collect())
    }

    /// Enumerate every currently visible MIDI output device.
    pub fn list_output_devices() -> Result<Vec<DeviceIdentity>, ActionError> {
        let midi_out = MidiOutput::new("midiflux-probe")
            .map_err(|e| ActionError::SinkUnavailable(format!("failed to open MIDI output: {e}")))?;
        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(i, port)| {
                let name = midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Port {i}"));
                DeviceIdentity {
                    id: format!("out:{i}"),
                    name,
                }
            })
            .collect())
    }

    pub fn is_open(&self, device_name: &str) -> bool {
        self.open.lock().expect("midi hub lock poisoned").contains_key(device_name)
    }

    /// Open an input connection by device name, if not already open.
    pub fn open_input(&self, device_name: &str) -> Result<(), ActionError> {
        if self.is_open(device_name) {
            return Ok(());
        }
        let midi_in = MidiInput::new("midiflux")
            .map_err(|e| ActionError::SinkUnavailable(format!("failed to open MIDI input: {e}")))?;
        let ports = midi_in.ports();
        let port = ports
            .iter()
            .find(|p| midi_in.port_name(p).map(|n| n == device_name).unwrap_or(false))
            .ok_or_else(|| ActionError::SinkUnavailable(format!("device '{device_name}' not found")))?;

        let identity = DeviceIdentity {
            id: device_name.to_string(),
            name: device_name.to_string(),
        };
        let event_tx = self.event_tx.clone();
        let callback_identity = identity.clone();
        let callback = move |_timestamp: u64, message: &[u8], _: &mut ()| {
            trace!(device = %callback_identity.name, len = message.len(), "midi input bytes");
            let Ok((msg, _len)) = MidiMsg::from_midi(message) else {
                debug!(device = %callback_identity.name, "failed to parse midi message");
                return;
            };
            let wire_channel = message.first().map(|b| b & 0x0F).unwrap_or(0);
            let Some(event) = MidiEvent::from_midi_msg(wire_channel, &msg) else {
                return;
            };
            if event_tx.try_send((callback_identity.clone(), event)).is_err() {
                warn!(device = %callback_identity.name, "midi event channel full or closed; dropping event");
            }
        };

        let connection = midi_in
            .connect(port, &format!("midiflux-{device_name}"), callback, ())
            .map_err(|e| ActionError::SinkUnavailable(format!("failed to connect '{device_name}': {e}")))?;

        self.open.lock().expect("midi hub lock poisoned").insert(
            device_name.to_string(),
            OpenInput {
                identity: identity.clone(),
                _connection: connection,
            },
        );
        let _ = self.connection_tx.try_send(DeviceConnectionEvent::Connected(identity));
        Ok(())
    }

    pub fn close_input(&self, device_name: &str) {
        let removed = self.open.lock().expect("midi hub lock poisoned").remove(device_name);
        if let Some(open) = removed {
            let _ = self
                .connection_tx
                .try_send(DeviceConnectionEvent::Disconnected(open.identity));
        }
    }

    /// Spawn the polling hot-plug reconciliation task (§14). Compares the
    /// live port list against the open set every [`POLL_INTERVAL`] and
    /// reports devices that vanished; it does not auto-open newly seen
    /// devices — that decision belongs to the profile controller (C9), which
    /// reopens devices its mappings reference.
    pub fn spawn_hotplug_poller(self: &Arc<Self>) {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                let live: Vec<String> = match MidiInputHub::list_input_devices() {
                    Ok(devices) => devices.into_iter().map(|d| d.name).collect(),
                    Err(e) => {
                        warn!(error = %e, "hot-plug poll: failed to enumerate midi input devices");
                        continue;
                    }
                };
                let gone: Vec<String> = {
                    let open = hub.open.lock().expect("midi hub lock poisoned");
                    open.keys().filter(|name| !live.contains(name)).cloned().collect()
                };
                for name in gone {
                    debug!(device = %name, "device no longer visible; closing stale connection");
                    hub.close_input(&name);
                }
            }
        });
    }
}

/// C10 MIDI output sink: one lazily-opened [`MidiOutputConnection`] per
/// device name.
pub struct MidirOutputSink {
    connections: Mutex<HashMap<String, MidiOutputConnection>>,
}

impl MidirOutputSink {
    pub fn new() -> Self {
        MidirOutputSink {
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn ensure_connection(&self, device_name: &str) -> Result<(), ActionError> {
        let mut connections = self.connections.lock().expect("midi output lock poisoned");
        if connections.contains_key(device_name) {
            return Ok(());
        }
        let midi_out = MidiOutput::new("midiflux")
            .map_err(|e| ActionError::SinkUnavailable(format!("failed to open MIDI output: {e}")))?;
        let ports = midi_out.ports();
        let port = ports
            .iter()
            .find(|p| midi_out.port_name(p).map(|n| n == device_name).unwrap_or(false))
            .ok_or_else(|| ActionError::SinkUnavailable(format!("output device '{device_name}' not found")))?;
        let connection = midi_out
            .connect(port, &format!("midiflux-out-{device_name}"))
            .map_err(|e| ActionError::SinkUnavailable(format!("failed to connect '{device_name}': {e}")))?;
        connections.insert(device_name.to_string(), connection);
        Ok(())
    }
}

impl Default for MidirOutputSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiOutputSink for MidirOutputSink {
    fn send(&self, device_name: &str, message: &midiflux_core::action::MidiMessage) -> Result<(), ActionError> {
        self.ensure_connection(device_name)?;
        let bytes = encode_midi_message(message);
        let mut connections = self.connections.lock().expect("midi output lock poisoned");
        let connection = connections
            .get_mut(device_name)
            .expect("connection just ensured above");
        connection
            .send(&bytes)
            .map_err(|e| ActionError::OsRefused(format!("failed to send midi message: {e}")))
    }
}

fn encode_midi_message(message: &midiflux_core::action::MidiMessage) -> Vec<u8> {
    use midiflux_core::action::MidiMessage::*;
    match *message {
        NoteOn { channel, note, velocity } => vec![0x90 | (channel & 0x0F), note, velocity],
        NoteOff { channel, note, velocity } => vec![0x80 | (channel & 0x0F), note, velocity],
        ControlChange { channel, controller, value } => vec![0xB0 | (channel & 0x0F), controller, value],
        ProgramChange { channel, program } => vec![0xC0 | (channel & 0x0F), program],
    }
}
