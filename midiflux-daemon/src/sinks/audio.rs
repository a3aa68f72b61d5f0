// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Audio sink (C10): `rodio`-backed playback. Non-blocking and
//! concurrent-plays-allowed per §4.10 — every `play` call spawns a fresh
//! `rodio::Sink` on a detached thread rather than serializing through one
//! shared output stream queue.

use midiflux_core::action::AudioSink;
use midiflux_core::error::ActionError;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{error, warn};

/// One `(OutputStream, OutputStreamHandle)` pair per named output device,
/// plus a default. Streams are kept alive for the process lifetime;
/// dropping an `OutputStream` silences everything playing through it.
pub struct RodioAudioSink {
    default_handle: rodio::OutputStreamHandle,
    // Held only to keep the default stream alive; never read again.
    _default_stream: rodio::OutputStream,
    named_handles: Mutex<HashMap<String, (rodio::OutputStream, rodio::OutputStreamHandle)>>,
}

impl RodioAudioSink {
    pub fn new() -> Result<Self, ActionError> {
        let (stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| ActionError::SinkUnavailable(format!("no default audio device: {e}")))?;
        Ok(RodioAudioSink {
            default_handle: handle,
            _default_stream: stream,
            named_handles: Mutex::new(HashMap::new()),
        })
    }

    fn handle_for(&self, device: Option<&str>) -> Result<rodio::OutputStreamHandle, ActionError> {
        let Some(name) = device else {
            return Ok(self.default_handle.clone());
        };
        let mut named = self.named_handles.lock().expect("audio handle lock poisoned");
        if let Some((_, handle)) = named.get(name) {
            return Ok(handle.clone());
        }
        let host = cpal_default_host_devices(name)?;
        let (stream, handle) = rodio::OutputStream::try_from_device(&host)
            .map_err(|e| ActionError::SinkUnavailable(format!("audio device '{name}' unavailable: {e}")))?;
        named.insert(name.to_string(), (stream, handle.clone()));
        Ok(handle)
    }
}

/// Finds a `cpal` output device by name, matching `rodio`'s own device
/// enumeration.
fn cpal_default_host_devices(name: &str) -> Result<cpal::Device, ActionError> {
    use cpal::traits::{DeviceTrait, HostTrait};
    let host = cpal::default_host();
    host.output_devices()
        .map_err(|e| ActionError::SinkUnavailable(format!("failed to enumerate audio devices: {e}")))?
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| ActionError::SinkUnavailable(format!("audio device '{name}' not found")))
}

/// Fallback used when no default output device is present at startup (a
/// headless host, a CI sandbox). Matches the gamepad sink's "sinks
/// degrade, they don't crash the dispatcher" posture: `PlaySound` actions
/// still validate and dispatch, they just log instead of playing.
#[derive(Debug, Default)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn play(&self, file_path: &str, _volume: u8, _device: Option<&str>) -> Result<(), ActionError> {
        warn!(file_path, "no audio output device available; dropping PlaySound action");
        Ok(())
    }
}

impl AudioSink for RodioAudioSink {
    fn play(&self, file_path: &str, volume: u8, device: Option<&str>) -> Result<(), ActionError> {
        let handle = self.handle_for(device)?;
        let path = file_path.to_string();
        let volume = (volume.min(100) as f32) / 100.0;
        // Detached thread: overlapping plays are allowed and none of them
        // suspend the dispatcher (§4.10 "non-blocking, concurrent plays
        // allowed").
        std::thread::spawn(move || {
            let file = match std::fs::File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    error!(path, error = %e, "failed to open audio file");
                    return;
                }
            };
            let source = match rodio::Decoder::new(std::io::BufReader::new(file)) {
                Ok(s) => s,
                Err(e) => {
                    error!(path, error = %e, "failed to decode audio file");
                    return;
                }
            };
            let sink = match rodio::Sink::try_new(&handle) {
                Ok(s) => s,
                Err(e) => {
                    warn!(path, error = %e, "failed to create audio sink");
                    return;
                }
            };
            sink.set_volume(volume);
            sink.append(source);
            sink.sleep_until_end();
        });
        Ok(())
    }
}
