// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Profile controller (C9): load/validate/publish sequence and device
//! reconciliation, implementing the five-step sequence of §4.9 as an
//! atomic config swap.

use std::path::PathBuf;
use std::sync::Arc;

use midiflux_core::action::{release_held_resource, ExecutionContext};
use midiflux_core::config::load_profile;
use midiflux_core::error::ConfigError;
use midiflux_core::model::{DeviceSelector, Profile};
use midiflux_core::registry::{Registry, RegistryHandle};
use tracing::{info, warn};

use crate::sinks::midi::MidiInputHub;

/// Holds the currently active profile and coordinates the five-step load
/// sequence (§4.9). Lives on the dispatch thread; `load` and `reconcile`
/// are only ever called from there, matching §5's "one logical dispatch
/// thread owns C3 publication, C6 writes". Carries the same
/// [`ExecutionContext`] the dispatcher executes actions with, so releasing a
/// held resource on profile swap (§4.9 step 3) goes through the real sink
/// rather than only clearing bookkeeping.
pub struct ProfileController {
    registry: Arc<RegistryHandle>,
    ctx: ExecutionContext,
    current: Profile,
    midi_hub: Arc<MidiInputHub>,
}

impl ProfileController {
    pub fn new(registry: Arc<RegistryHandle>, ctx: ExecutionContext, midi_hub: Arc<MidiInputHub>) -> Self {
        ProfileController {
            registry,
            ctx,
            current: Profile::empty("(none)"),
            midi_hub,
        }
    }

    pub fn current_profile_name(&self) -> &str {
        &self.current.name
    }

    pub fn current_profile(&self) -> &Profile {
        &self.current
    }

    /// Load, validate, and atomically publish a new profile (§4.9 steps
    /// 1-4), then reconcile device attachments (step 5). On any validation
    /// failure the previous profile is retained untouched (step 6).
    pub async fn load(&mut self, json: &str) -> Result<(), ConfigError> {
        let profile = load_profile(json)?;

        // Step 3: release held resources from the outgoing profile and
        // reset state before the new profile's initial states apply. Safe
        // to do before publication since failures above already returned.
        self.release_all_held().await;
        self.ctx.state.clear_all();
        self.ctx.state.init_from(&profile.initial_states);

        // Step 2 + 4: build and publish the new registry snapshot.
        let registry = Registry::build(&profile);
        self.registry.publish(registry);

        self.current = profile;

        // Step 5: reconcile device attachments for the newly active profile.
        self.reconcile_devices().await;

        info!(profile = %self.current.name, "profile loaded and published");
        Ok(())
    }

    /// Releases every resource still held by the outgoing profile for real
    /// (§4.9 step 3, §8 scenario 7: "keyUp(70) emitted during swap").
    async fn release_all_held(&self) {
        for key in self.ctx.state.held_keys() {
            release_held_resource(&self.ctx, &key).await;
        }
    }

    /// Open every device the new profile's mappings reference: literal
    /// names are opened if currently connected; `*` opens every currently
    /// connected input device (§4.9 step 5).
    pub async fn reconcile_devices(&self) {
        let wants_any = self
            .current
            .devices
            .iter()
            .any(|d| matches!(d.device_name, DeviceSelector::Any));

        let literal_names: Vec<String> = self
            .current
            .devices
            .iter()
            .filter_map(|d| match &d.device_name {
                DeviceSelector::Exact(name) => Some(name.clone()),
                DeviceSelector::Any => None,
            })
            .collect();

        let connected = match MidiInputHub::list_input_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "failed to enumerate midi input devices during reconciliation");
                return;
            }
        };

        for device in &connected {
            let should_open = wants_any || literal_names.contains(&device.name);
            if should_open {
                if let Err(e) = self.midi_hub.open_input(&device.name) {
                    warn!(device = %device.name, error = %e, "failed to open device during reconciliation");
                }
            }
        }
    }

    /// Hot-plug connect handler (§4.9 "Hot-plug"): reapplies the same
    /// matching rule used at load time to a single newly connected device.
    pub fn on_device_connected(&self, device_name: &str) {
        let matches = self
            .current
            .devices
            .iter()
            .any(|d| d.device_name.matches(device_name));
        if matches {
            if let Err(e) = self.midi_hub.open_input(device_name) {
                warn!(device = %device_name, error = %e, "failed to open reconnected device");
            }
        }
    }

    /// Hot-plug disconnect handler: closes the handle but leaves the
    /// mapping in place so a future `onConnected` can reopen it.
    pub fn on_device_disconnected(&self, device_name: &str) {
        self.midi_hub.close_input(device_name);
    }
}

pub async fn read_profile_file(path: &PathBuf) -> std::io::Result<String> {
    tokio::fs::read_to_string(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use midiflux_core::action::{
        AudioSink, CommandSink, GamepadAxis, GamepadButton, GamepadSink, KeyCode, KeyboardSink,
        LockKey, MidiMessage, MidiOutputSink, MouseButton, MouseSink, ReleaseScheduler,
        ScrollDirection, ShellKind,
    };
    use midiflux_core::error::ActionError;
    use midiflux_core::registry::RegistryHandle;
    use midiflux_core::state::StateManager;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingKeyboard {
        ups: Mutex<Vec<KeyCode>>,
    }
    #[async_trait]
    impl KeyboardSink for RecordingKeyboard {
        async fn key_down(&self, _code: KeyCode) -> Result<(), ActionError> {
            Ok(())
        }
        async fn key_up(&self, code: KeyCode) -> Result<(), ActionError> {
            self.ups.lock().unwrap().push(code);
            Ok(())
        }
        async fn key_toggle(&self, _code: LockKey) -> Result<(), ActionError> {
            Ok(())
        }
    }

    struct NullMouse;
    #[async_trait]
    impl MouseSink for NullMouse {
        async fn click(&self, _: MouseButton) -> Result<(), ActionError> {
            Ok(())
        }
        async fn scroll(&self, _: ScrollDirection, _: u32) -> Result<(), ActionError> {
            Ok(())
        }
    }

    struct NullGamepad;
    #[async_trait]
    impl GamepadSink for NullGamepad {
        async fn set_button(&self, _: u8, _: GamepadButton, _: bool) -> Result<(), ActionError> {
            Ok(())
        }
        async fn set_axis(&self, _: u8, _: GamepadAxis, _: i32, _: Option<u64>) -> Result<(), ActionError> {
            Ok(())
        }
        fn available(&self) -> bool {
            false
        }
    }

    struct NullCommand;
    #[async_trait]
    impl CommandSink for NullCommand {
        fn spawn_detached(&self, _: &str, _: ShellKind, _: bool) -> Result<(), ActionError> {
            Ok(())
        }
        async fn spawn_and_wait(&self, _: &str, _: ShellKind, _: bool) -> Result<i32, ActionError> {
            Ok(0)
        }
    }

    struct NullAudio;
    impl AudioSink for NullAudio {
        fn play(&self, _: &str, _: u8, _: Option<&str>) -> Result<(), ActionError> {
            Ok(())
        }
    }

    struct NullMidiOutput;
    impl MidiOutputSink for NullMidiOutput {
        fn send(&self, _: &str, _: &MidiMessage) -> Result<(), ActionError> {
            Ok(())
        }
    }

    struct NullReleaseScheduler;
    impl ReleaseScheduler for NullReleaseScheduler {
        fn schedule_release(&self, _held_key: String, _delay: Duration) {}
    }

    fn test_ctx() -> (ExecutionContext, Arc<RecordingKeyboard>) {
        let keyboard = Arc::new(RecordingKeyboard::default());
        let ctx = ExecutionContext {
            state: Arc::new(StateManager::new()),
            keyboard: keyboard.clone(),
            mouse: Arc::new(NullMouse),
            gamepad: Arc::new(NullGamepad),
            command: Arc::new(NullCommand),
            audio: Arc::new(NullAudio),
            midi_output: Arc::new(NullMidiOutput),
            release_scheduler: Arc::new(NullReleaseScheduler),
        };
        (ctx, keyboard)
    }

    fn new_controller() -> (ProfileController, Arc<RecordingKeyboard>) {
        let (event_tx, _event_rx) = mpsc::channel(16);
        let (conn_tx, _conn_rx) = mpsc::channel(16);
        let hub = Arc::new(MidiInputHub::new(event_tx, conn_tx));
        let (ctx, keyboard) = test_ctx();
        (
            ProfileController::new(Arc::new(RegistryHandle::default()), ctx, hub),
            keyboard,
        )
    }

    #[tokio::test]
    async fn rejects_invalid_profile_json_and_keeps_previous() {
        let (mut controller, _keyboard) = new_controller();
        let result = controller.load("not json at all").await;
        assert!(result.is_err());
        assert_eq!(controller.current_profile_name(), "(none)");
    }

    #[tokio::test]
    async fn loads_a_minimal_valid_profile() {
        let (mut controller, _keyboard) = new_controller();
        let json = r#"{
            "profileName": "studio",
            "initialStates": {},
            "midiDevices": []
        }"#;
        controller.load(json).await.expect("valid profile should load");
        assert_eq!(controller.current_profile_name(), "studio");
    }

    #[tokio::test]
    async fn swap_emits_a_real_key_up_for_a_held_key() {
        let (mut controller, keyboard) = new_controller();
        controller.ctx.state.record_held(&midiflux_core::action::held_key_for(KeyCode::Code(70))).unwrap();

        let json = r#"{
            "profileName": "empty",
            "initialStates": {},
            "midiDevices": []
        }"#;
        controller.load(json).await.expect("valid profile should load");

        assert_eq!(keyboard.ups.lock().unwrap().as_slice(), [KeyCode::Code(70)]);
        assert!(controller.ctx.state.held_keys().is_empty());
    }
}
