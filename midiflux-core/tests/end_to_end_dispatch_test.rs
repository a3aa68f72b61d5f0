// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! End-to-end scenarios chaining config loading, registry lookup, and action
//! execution together, the way a real dispatch would (§8).

use async_trait::async_trait;
use midiflux_core::action::{
    AudioSink, CommandSink, ExecutionContext, GamepadAxis, GamepadButton, GamepadSink, KeyCode,
    KeyboardSink, LockKey, MidiMessage, MidiOutputSink, MouseButton, MouseSink, ReleaseScheduler,
    ScrollDirection, ShellKind,
};
use midiflux_core::config::load_profile;
use midiflux_core::error::ActionError;
use midiflux_core::midi::Channel;
use midiflux_core::registry::Registry;
use midiflux_core::state::StateManager;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingKeyboard {
    events: Mutex<Vec<String>>,
}

#[async_trait]
impl KeyboardSink for RecordingKeyboard {
    async fn key_down(&self, code: KeyCode) -> Result<(), ActionError> {
        self.events.lock().unwrap().push(format!("down:{code:?}"));
        Ok(())
    }
    async fn key_up(&self, code: KeyCode) -> Result<(), ActionError> {
        self.events.lock().unwrap().push(format!("up:{code:?}"));
        Ok(())
    }
    async fn key_toggle(&self, code: LockKey) -> Result<(), ActionError> {
        self.events.lock().unwrap().push(format!("toggle:{code:?}"));
        Ok(())
    }
}

struct NullMouse;
#[async_trait]
impl MouseSink for NullMouse {
    async fn click(&self, _button: MouseButton) -> Result<(), ActionError> {
        Ok(())
    }
    async fn scroll(&self, _direction: ScrollDirection, _amount: u32) -> Result<(), ActionError> {
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

fn test_context() -> (ExecutionContext, Arc<RecordingKeyboard>) {
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

#[test]
fn note_on_then_off_maps_to_key_press_release_via_registry() {
    let json = r#"{
        "profileName": "E2E",
        "initialStates": {},
        "midiDevices": [
            {
                "deviceName": "Launchpad",
                "mappings": [
                    {
                        "inputType": "NoteOn",
                        "channel": 1,
                        "note": 60,
                        "action": { "type": "KeyPressRelease", "key": "Space" }
                    }
                ]
            }
        ]
    }"#;
    let profile = load_profile(json).expect("profile loads");
    let registry = Registry::build(&profile);
    let hits = registry.lookup(
        "Launchpad",
        Channel::Exact(1),
        midiflux_core::midi::InputType::NoteOn,
        Some(60),
    );
    assert_eq!(hits.len(), 1);

    let (ctx, keyboard) = test_context();
    hits[0].action.execute(&ctx, Some(100)).expect("action executes");
    assert_eq!(keyboard.events.lock().unwrap().as_slice(), ["down:Space", "up:Space"]);
}

#[test]
fn conditional_picks_branch_by_velocity_range() {
    let json = r#"{
        "profileName": "E2E",
        "initialStates": {},
        "midiDevices": [
            {
                "deviceName": "*",
                "mappings": [
                    {
                        "inputType": "NoteOn",
                        "channel": 1,
                        "note": 36,
                        "action": {
                            "type": "Conditional",
                            "conditions": [
                                { "minValue": 0, "maxValue": 63, "action": { "type": "KeyPressRelease", "key": "Tab" } },
                                { "minValue": 64, "maxValue": 127, "action": { "type": "KeyPressRelease", "key": "Escape" } }
                            ]
                        }
                    }
                ]
            }
        ]
    }"#;
    let profile = load_profile(json).expect("profile loads");
    let registry = Registry::build(&profile);
    let hits = registry.lookup(
        "AnyDevice",
        Channel::Exact(1),
        midiflux_core::midi::InputType::NoteOn,
        Some(36),
    );
    assert_eq!(hits.len(), 1);

    let (ctx, keyboard) = test_context();
    hits[0].action.execute(&ctx, Some(20)).unwrap();
    assert_eq!(keyboard.events.lock().unwrap().as_slice(), ["down:Tab", "up:Tab"]);

    keyboard.events.lock().unwrap().clear();
    hits[0].action.execute(&ctx, Some(100)).unwrap();
    assert_eq!(keyboard.events.lock().unwrap().as_slice(), ["down:Escape", "up:Escape"]);
}

#[test]
fn relative_cc_accumulates_across_repeated_increments() {
    let json = r#"{
        "profileName": "E2E",
        "initialStates": {},
        "midiDevices": [
            {
                "deviceName": "*",
                "mappings": [
                    {
                        "inputType": "ControlChangeRelative",
                        "channel": 1,
                        "controlNumber": 20,
                        "action": {
                            "type": "RelativeCC",
                            "increaseAction": { "type": "KeyPressRelease", "key": "UpArrow" },
                            "decreaseAction": { "type": "KeyPressRelease", "key": "DownArrow" }
                        }
                    }
                ]
            }
        ]
    }"#;
    let profile = load_profile(json).expect("profile loads");
    let registry = Registry::build(&profile);
    let (kind, hits) = registry.lookup_control_change("AnyDevice", Channel::Exact(1), 20);
    assert_eq!(kind, midiflux_core::midi::InputType::ControlChangeRelative);
    assert_eq!(hits.len(), 1);

    let (ctx, keyboard) = test_context();
    // Three consecutive "turn right" ticks of increasing magnitude.
    hits[0].action.execute(&ctx, Some(3)).unwrap();
    let ups = keyboard
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("down:UpArrow"))
        .count();
    assert_eq!(ups, 3);

    keyboard.events.lock().unwrap().clear();
    hits[0].action.execute(&ctx, Some(66)).unwrap();
    let downs = keyboard
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.starts_with("down:DownArrow"))
        .count();
    assert_eq!(downs, 2);
}

#[test]
fn sequence_runs_children_in_order_and_delay_does_not_touch_sinks() {
    let json = r#"{
        "profileName": "E2E",
        "initialStates": {},
        "midiDevices": [
            {
                "deviceName": "*",
                "mappings": [
                    {
                        "inputType": "NoteOn",
                        "channel": 1,
                        "note": 10,
                        "action": {
                            "type": "Sequence",
                            "errorPolicy": "StopOnError",
                            "subActions": [
                                { "type": "KeyPressRelease", "key": "Tab" },
                                { "type": "Delay", "ms": 1 },
                                { "type": "KeyPressRelease", "key": "Return" }
                            ]
                        }
                    }
                ]
            }
        ]
    }"#;
    let profile = load_profile(json).expect("profile loads");
    let registry = Registry::build(&profile);
    let hits = registry.lookup(
        "AnyDevice",
        Channel::Exact(1),
        midiflux_core::midi::InputType::NoteOn,
        Some(10),
    );

    let (ctx, keyboard) = test_context();
    hits[0].action.execute(&ctx, None).unwrap();
    assert_eq!(
        keyboard.events.lock().unwrap().as_slice(),
        ["down:Tab", "up:Tab", "down:Return", "up:Return"]
    );
}

#[tokio::test]
async fn sequence_with_delay_dispatches_through_the_async_path() {
    let json = r#"{
        "profileName": "E2E",
        "initialStates": {},
        "midiDevices": [
            {
                "deviceName": "*",
                "mappings": [
                    {
                        "inputType": "NoteOn",
                        "channel": 1,
                        "note": 12,
                        "action": {
                            "type": "Sequence",
                            "errorPolicy": "StopOnError",
                            "subActions": [
                                { "type": "KeyPressRelease", "key": "Tab" },
                                { "type": "Delay", "ms": 1 },
                                { "type": "KeyPressRelease", "key": "Return" }
                            ]
                        }
                    }
                ]
            }
        ]
    }"#;
    let profile = load_profile(json).expect("profile loads");
    let registry = Registry::build(&profile);
    let hits = registry.lookup(
        "AnyDevice",
        Channel::Exact(1),
        midiflux_core::midi::InputType::NoteOn,
        Some(12),
    );

    assert!(hits[0].action.requires_async(), "a Sequence containing a Delay must require async dispatch");

    let (ctx, keyboard) = test_context();
    hits[0].action.execute_async(&ctx, None).await.unwrap();
    assert_eq!(
        keyboard.events.lock().unwrap().as_slice(),
        ["down:Tab", "up:Tab", "down:Return", "up:Return"]
    );
}

#[test]
fn alternating_toggles_between_children_only_on_success() {
    let json = r#"{
        "profileName": "E2E",
        "initialStates": {},
        "midiDevices": [
            {
                "deviceName": "*",
                "mappings": [
                    {
                        "inputType": "NoteOn",
                        "channel": 1,
                        "note": 11,
                        "action": {
                            "type": "Alternating",
                            "startWithFirst": true,
                            "firstAction": { "type": "KeyPressRelease", "key": "F1" },
                            "secondAction": { "type": "KeyPressRelease", "key": "F2" }
                        }
                    }
                ]
            }
        ]
    }"#;
    let profile = load_profile(json).expect("profile loads");
    let registry = Registry::build(&profile);
    let hits = registry.lookup(
        "AnyDevice",
        Channel::Exact(1),
        midiflux_core::midi::InputType::NoteOn,
        Some(11),
    );

    let (ctx, keyboard) = test_context();
    hits[0].action.execute(&ctx, None).unwrap();
    assert!(keyboard.events.lock().unwrap().contains(&"down:F1".to_string()));

    keyboard.events.lock().unwrap().clear();
    hits[0].action.execute(&ctx, None).unwrap();
    assert!(keyboard.events.lock().unwrap().contains(&"down:F2".to_string()));

    keyboard.events.lock().unwrap().clear();
    hits[0].action.execute(&ctx, None).unwrap();
    assert!(keyboard.events.lock().unwrap().contains(&"down:F1".to_string()));
}

#[tokio::test]
async fn profile_swap_releases_all_held_resources() {
    let (ctx, keyboard) = test_context();
    // Simulate a KeyDown with no matching KeyUp before the profile swaps. The
    // held key must decode back to a real KeyCode for the sink call below.
    let held_key = midiflux_core::action::held_key_for(KeyCode::Code(999));
    ctx.state.record_held(&held_key).unwrap();
    assert_eq!(ctx.state.held_keys().len(), 1);

    // The profile controller's step-3 "release held" sweep (§4.9, §8 scenario
    // 7): every held internal key is released through the real sink, not
    // just dropped from the state map.
    for held in ctx.state.held_keys() {
        midiflux_core::action::release_held_resource(&ctx, &held).await;
    }

    assert!(ctx.state.held_keys().is_empty());
    assert_eq!(keyboard.events.lock().unwrap().as_slice(), ["up:Code(999)"]);
}
