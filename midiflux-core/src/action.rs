// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! The polymorphic action model (C4) and the simple action catalog.
//!
//! `Action` is a tagged union (§9 Design Notes: "the polymorphic Action...
//! becomes a tagged variant") rather than a trait object, so composite
//! actions can hold child actions by value without going through `dyn`.
//! Composite variants (`Sequence`, `Conditional`, `StateConditional`,
//! `Alternating`, `RelativeCc`) are defined in [`crate::composite`] and
//! re-exported here as part of the same enum.

use crate::composite::{Alternating, Conditional, RelativeCc, Sequence, StateConditional};
use crate::error::ActionError;
use crate::midi::InputCategory;
use crate::model::ActionId;
use crate::state::StateManager;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Platform-independent keyboard key code. The daemon's keyboard sink maps
/// this to a concrete `enigo::Key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum KeyCode {
    Unicode(char),
    Space,
    Return,
    Tab,
    Escape,
    Backspace,
    Delete,
    UpArrow,
    DownArrow,
    LeftArrow,
    RightArrow,
    Home,
    End,
    PageUp,
    PageDown,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    VolumeUp,
    VolumeDown,
    Mute,
    PlayPause,
    /// Opaque numeric code for keys not named above, carried through
    /// verbatim to the sink.
    Code(u32),
}

/// Hardware lock keys toggled by `KeyToggle`; the OS owns the lock
/// semantics, the sink only issues a press/release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum LockKey {
    CapsLock,
    NumLock,
    ScrollLock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ShellKind {
    /// `/bin/sh -c` on Unix, `cmd /C` on Windows.
    Default,
    Bash,
    Powershell,
}

impl Default for ShellKind {
    fn default() -> Self {
        ShellKind::Default
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum PressType {
    Press,
    Release,
    PressRelease,
}

/// Opaque gamepad button identifier; the gamepad sink maps this to its
/// virtual-controller backend's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GamepadButton(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum GamepadAxis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
}

impl GamepadAxis {
    pub fn is_trigger(self) -> bool {
        matches!(self, GamepadAxis::LeftTrigger | GamepadAxis::RightTrigger)
    }
}

/// How a `GameControllerAxis` action's value is produced (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum AxisMode {
    FixedValue { value: i32, duration_ms: Option<u64> },
    MidiMapped,
}

/// A single outgoing MIDI message for the `MidiOutput` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
}

/// Error-handling policy for a `Sequence` (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ErrorPolicy {
    ContinueOnError,
    StopOnError,
}

/// A single validation failure, reported with the JSON path of its source
/// (§7 "human-readable error messages carry JSON path").
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub path: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Per-dispatch handle to the effect sinks, state manager, and release
/// scheduler an action needs. Threaded explicitly through `execute`/
/// `execute_async` rather than reached via ambient global state (§9 "Global
/// service access").
#[derive(Clone)]
pub struct ExecutionContext {
    pub state: Arc<StateManager>,
    pub keyboard: Arc<dyn KeyboardSink>,
    pub mouse: Arc<dyn MouseSink>,
    pub gamepad: Arc<dyn GamepadSink>,
    pub command: Arc<dyn CommandSink>,
    pub audio: Arc<dyn AudioSink>,
    pub midi_output: Arc<dyn MidiOutputSink>,
    pub release_scheduler: Arc<dyn ReleaseScheduler>,
}

/// Schedules a deferred release for a held resource (§4.6, §9 "Auto-release
/// timers"). Implemented by the dispatcher as a single timer source so
/// releases are ordered with other events rather than firing off an
/// unsupervised per-action thread.
pub trait ReleaseScheduler: Send + Sync {
    fn schedule_release(&self, held_key: String, delay: Duration);
}

#[async_trait]
pub trait KeyboardSink: Send + Sync {
    async fn key_down(&self, code: KeyCode) -> Result<(), ActionError>;
    async fn key_up(&self, code: KeyCode) -> Result<(), ActionError>;
    async fn key_toggle(&self, code: LockKey) -> Result<(), ActionError>;
}

#[async_trait]
pub trait MouseSink: Send + Sync {
    async fn click(&self, button: MouseButton) -> Result<(), ActionError>;
    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), ActionError>;
}

#[async_trait]
pub trait GamepadSink: Send + Sync {
    async fn set_button(
        &self,
        controller_index: u8,
        button: GamepadButton,
        pressed: bool,
    ) -> Result<(), ActionError>;
    async fn set_axis(
        &self,
        controller_index: u8,
        axis: GamepadAxis,
        raw_value: i32,
        duration_ms: Option<u64>,
    ) -> Result<(), ActionError>;
    fn available(&self) -> bool;
}

#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Fire-and-forget spawn; used when `waitForExit` is false.
    fn spawn_detached(
        &self,
        command: &str,
        shell_kind: ShellKind,
        hide_console: bool,
    ) -> Result<(), ActionError>;

    /// Spawn and await the child's exit code; used when `waitForExit` is
    /// true, on the async path.
    async fn spawn_and_wait(
        &self,
        command: &str,
        shell_kind: ShellKind,
        hide_console: bool,
    ) -> Result<i32, ActionError>;
}

pub trait AudioSink: Send + Sync {
    fn play(&self, file_path: &str, volume: u8, device: Option<&str>) -> Result<(), ActionError>;
}

pub trait MidiOutputSink: Send + Sync {
    fn send(&self, device_name: &str, message: &MidiMessage) -> Result<(), ActionError>;
}

/// The polymorphic action (§3 `Action`, §4.4/§4.5). Each variant carries its
/// own `id`, assigned once at construction time and never recomputed.
#[derive(Debug, Clone)]
pub enum Action {
    KeyPressRelease {
        id: ActionId,
        key: KeyCode,
    },
    KeyDown {
        id: ActionId,
        key: KeyCode,
        auto_release_ms: Option<u64>,
    },
    KeyUp {
        id: ActionId,
        key: KeyCode,
    },
    KeyToggle {
        id: ActionId,
        key: LockKey,
    },
    MouseClick {
        id: ActionId,
        button: MouseButton,
    },
    MouseScroll {
        id: ActionId,
        direction: ScrollDirection,
        amount: u32,
    },
    CommandExecution {
        id: ActionId,
        command: String,
        shell_kind: ShellKind,
        hide_console: bool,
        wait_for_exit: bool,
    },
    Delay {
        id: ActionId,
        ms: u64,
    },
    GameControllerButton {
        id: ActionId,
        controller_index: u8,
        button: GamepadButton,
        press_type: PressType,
    },
    GameControllerAxis {
        id: ActionId,
        controller_index: u8,
        axis: GamepadAxis,
        mode: AxisMode,
    },
    MidiOutput {
        id: ActionId,
        output_device_name: String,
        commands: Vec<MidiMessage>,
    },
    PlaySound {
        id: ActionId,
        file_path: String,
        volume: u8,
        audio_device: Option<String>,
    },
    Sequence(Sequence),
    Conditional(Conditional),
    StateConditional(StateConditional),
    Alternating(Alternating),
    RelativeCc(RelativeCc),
}

/// Recursion bound for composite action graphs (§9 "Composite recursion").
pub const MAX_ACTION_DEPTH: usize = 256;

impl Action {
    pub fn id(&self) -> ActionId {
        match self {
            Action::KeyPressRelease { id, .. }
            | Action::KeyDown { id, .. }
            | Action::KeyUp { id, .. }
            | Action::KeyToggle { id, .. }
            | Action::MouseClick { id, .. }
            | Action::MouseScroll { id, .. }
            | Action::CommandExecution { id, .. }
            | Action::Delay { id, .. }
            | Action::GameControllerButton { id, .. }
            | Action::GameControllerAxis { id, .. }
            | Action::MidiOutput { id, .. }
            | Action::PlaySound { id, .. } => *id,
            Action::Sequence(s) => s.id,
            Action::Conditional(c) => c.id,
            Action::StateConditional(s) => s.id,
            Action::Alternating(a) => a.id,
            Action::RelativeCc(r) => r.id,
        }
    }

    pub fn new_key_press_release(_description: &str, key: KeyCode) -> Action {
        Action::KeyPressRelease {
            id: ActionId::new(),
            key,
        }
    }

    /// Whether this action (or any of its children) must run on the async
    /// path rather than the synchronous one (§4.8 step 3).
    pub fn requires_async(&self) -> bool {
        match self {
            Action::Delay { .. } => true,
            Action::CommandExecution { wait_for_exit, .. } => *wait_for_exit,
            Action::Sequence(s) => s.sub_actions.iter().any(Action::requires_async),
            Action::Conditional(c) => c.conditions.iter().any(|cond| cond.action.requires_async()),
            Action::StateConditional(s) => {
                s.true_action.requires_async()
                    || s.false_action.as_deref().is_some_and(Action::requires_async)
            }
            Action::Alternating(a) => {
                a.first_action.requires_async() || a.second_action.requires_async()
            }
            Action::RelativeCc(r) => {
                r.increase_action.requires_async() || r.decrease_action.requires_async()
            }
            _ => false,
        }
    }

    /// Pure, load-time validation (§4.4). Called recursively; `depth` guards
    /// the recursion bound (§9).
    pub fn validate(&self, path: &str, depth: usize) -> Vec<ValidationError> {
        if depth > MAX_ACTION_DEPTH {
            return vec![ValidationError::new(
                path,
                format!("action graph exceeds recursion bound of {MAX_ACTION_DEPTH}"),
            )];
        }
        match self {
            Action::CommandExecution { command, .. } if command.trim().is_empty() => {
                vec![ValidationError::new(path, "command must not be empty")]
            }
            Action::PlaySound { volume, .. } if *volume > 100 => {
                vec![ValidationError::new(path, "volume must be 0..=100")]
            }
            Action::GameControllerButton {
                controller_index, ..
            }
            | Action::GameControllerAxis {
                controller_index, ..
            } if *controller_index > 3 => {
                vec![ValidationError::new(path, "controllerIndex must be 0..=3")]
            }
            Action::Sequence(s) => s.validate(path, depth),
            Action::Conditional(c) => c.validate(path, depth),
            Action::StateConditional(s) => s.validate(path, depth),
            Action::Alternating(a) => a.validate(path, depth),
            Action::RelativeCc(r) => r.validate(path, depth),
            _ => Vec::new(),
        }
    }

    /// Categories of input this action can legally be bound to (§4.4).
    pub fn compatible_input_categories(&self) -> HashSet<InputCategory> {
        let mut set = HashSet::new();
        match self {
            Action::KeyPressRelease { .. }
            | Action::KeyDown { .. }
            | Action::KeyUp { .. }
            | Action::KeyToggle { .. }
            | Action::MouseClick { .. }
            | Action::MouseScroll { .. }
            | Action::CommandExecution { .. }
            | Action::PlaySound { .. }
            | Action::GameControllerButton { .. }
            | Action::MidiOutput { .. } => {
                set.insert(InputCategory::Trigger);
            }
            Action::Delay { .. } => {
                set.insert(InputCategory::Trigger);
                set.insert(InputCategory::AbsoluteValue);
                set.insert(InputCategory::RelativeValue);
            }
            Action::GameControllerAxis { mode, .. } => match mode {
                AxisMode::FixedValue { .. } => {
                    set.insert(InputCategory::Trigger);
                }
                AxisMode::MidiMapped => {
                    set.insert(InputCategory::AbsoluteValue);
                }
            },
            Action::Sequence(s) => {
                for child in &s.sub_actions {
                    set.extend(child.compatible_input_categories());
                }
            }
            Action::Conditional(c) => {
                set.insert(InputCategory::AbsoluteValue);
                for cond in &c.conditions {
                    set.extend(cond.action.compatible_input_categories());
                }
            }
            Action::StateConditional(s) => {
                set.extend(s.true_action.compatible_input_categories());
                if let Some(false_action) = &s.false_action {
                    set.extend(false_action.compatible_input_categories());
                }
            }
            Action::Alternating(a) => {
                set.extend(a.first_action.compatible_input_categories());
                set.extend(a.second_action.compatible_input_categories());
            }
            Action::RelativeCc(r) => {
                set.insert(InputCategory::RelativeValue);
                set.extend(r.increase_action.compatible_input_categories());
                set.extend(r.decrease_action.compatible_input_categories());
            }
        }
        set
    }

    /// Synchronous execution path (§4.4, §5 "does not suspend"). Never
    /// called directly for actions where [`Action::requires_async`] is true;
    /// the dispatcher routes those to [`Action::execute_async`] instead.
    pub fn execute(&self, ctx: &ExecutionContext, value: Option<i32>) -> Result<(), ActionError> {
        match self {
            Action::KeyPressRelease { key, .. } => {
                futures_lite_block_on(ctx.keyboard.key_down(*key))?;
                futures_lite_block_on(ctx.keyboard.key_up(*key))
            }
            Action::KeyDown {
                key,
                auto_release_ms,
                ..
            } => {
                futures_lite_block_on(ctx.keyboard.key_down(*key))?;
                let held_key = held_key_for(*key);
                ctx.state.record_held(&held_key)?;
                if let Some(ms) = auto_release_ms {
                    ctx.release_scheduler
                        .schedule_release(held_key, Duration::from_millis(*ms));
                }
                Ok(())
            }
            Action::KeyUp { key, .. } => {
                futures_lite_block_on(ctx.keyboard.key_up(*key))?;
                ctx.state.release_held(&held_key_for(*key));
                Ok(())
            }
            Action::KeyToggle { key, .. } => futures_lite_block_on(ctx.keyboard.key_toggle(*key)),
            Action::MouseClick { button, .. } => futures_lite_block_on(ctx.mouse.click(*button)),
            Action::MouseScroll {
                direction, amount, ..
            } => futures_lite_block_on(ctx.mouse.scroll(*direction, *amount)),
            Action::CommandExecution {
                command,
                shell_kind,
                hide_console,
                wait_for_exit,
                ..
            } => {
                debug_assert!(!wait_for_exit, "waitForExit actions require the async path");
                ctx.command
                    .spawn_detached(command, *shell_kind, *hide_console)
            }
            Action::Delay { .. } => Ok(()),
            Action::GameControllerButton {
                controller_index,
                button,
                press_type,
                ..
            } => execute_gamepad_button(ctx, *controller_index, *button, *press_type),
            Action::GameControllerAxis {
                controller_index,
                axis,
                mode,
                ..
            } => execute_gamepad_axis(ctx, *controller_index, *axis, *mode, value),
            Action::MidiOutput {
                output_device_name,
                commands,
                ..
            } => {
                for command in commands {
                    ctx.midi_output.send(output_device_name, command)?;
                }
                Ok(())
            }
            Action::PlaySound {
                file_path,
                volume,
                audio_device,
                ..
            } => ctx.audio.play(file_path, *volume, audio_device.as_deref()),
            Action::Sequence(s) => s.execute(ctx, value),
            Action::Conditional(c) => c.execute(ctx, value),
            Action::StateConditional(s) => s.execute(ctx, value),
            Action::Alternating(a) => a.execute(ctx, value),
            Action::RelativeCc(r) => r.execute(ctx, value),
        }
    }

    /// Async execution path (§4.4, §5). Required for `Delay`, `waitForExit`
    /// commands, and any composite that recursively contains one.
    pub async fn execute_async(
        &self,
        ctx: &ExecutionContext,
        value: Option<i32>,
    ) -> Result<(), ActionError> {
        match self {
            Action::Delay { ms, .. } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
            Action::CommandExecution {
                command,
                shell_kind,
                hide_console,
                wait_for_exit,
                ..
            } => {
                if *wait_for_exit {
                    let code = ctx
                        .command
                        .spawn_and_wait(command, *shell_kind, *hide_console)
                        .await?;
                    if code != 0 {
                        tracing::warn!(command = %command, exit_code = code, "command exited non-zero");
                    }
                    Ok(())
                } else {
                    ctx.command
                        .spawn_detached(command, *shell_kind, *hide_console)
                }
            }
            Action::Sequence(s) => s.execute_async(ctx, value).await,
            Action::Conditional(c) => c.execute_async(ctx, value).await,
            Action::StateConditional(s) => s.execute_async(ctx, value).await,
            Action::Alternating(a) => a.execute_async(ctx, value).await,
            Action::RelativeCc(r) => r.execute_async(ctx, value).await,
            other => other.execute(ctx, value),
        }
    }
}

/// Internal state key under which a held virtual key is tracked (§4.6
/// `*Key<digits>`). The namespace only accepts all-digit suffixes, so the
/// variant is folded into the numeric value itself as a leading tag digit
/// (`0` = raw code, `1` = unicode, `2` = named) rather than using `Debug`
/// output, which would smuggle letters into the key.
pub fn held_key_for(key: KeyCode) -> String {
    match key {
        KeyCode::Code(raw) => format!("*Key0{raw}"),
        KeyCode::Unicode(c) => format!("*Key1{}", c as u32),
        other => format!("*Key2{}", named_key_index(other)),
    }
}

/// Recovers the [`KeyCode`] a [`held_key_for`] string was derived from, for
/// the auto-release path where only the string survives the timer.
pub fn key_code_from_held_key(held_key: &str) -> Option<KeyCode> {
    let digits = held_key.strip_prefix("*Key")?;
    if digits.is_empty() {
        return None;
    }
    let (tag, rest) = digits.split_at(1);
    let value: u32 = rest.parse().ok()?;
    match tag {
        "0" => Some(KeyCode::Code(value)),
        "1" => char::from_u32(value).map(KeyCode::Unicode),
        "2" => named_key_from_index(value),
        _ => None,
    }
}

fn named_key_index(key: KeyCode) -> u32 {
    match key {
        KeyCode::Space => 0,
        KeyCode::Return => 1,
        KeyCode::Tab => 2,
        KeyCode::Escape => 3,
        KeyCode::Backspace => 4,
        KeyCode::Delete => 5,
        KeyCode::UpArrow => 6,
        KeyCode::DownArrow => 7,
        KeyCode::LeftArrow => 8,
        KeyCode::RightArrow => 9,
        KeyCode::Home => 10,
        KeyCode::End => 11,
        KeyCode::PageUp => 12,
        KeyCode::PageDown => 13,
        KeyCode::F1 => 14,
        KeyCode::F2 => 15,
        KeyCode::F3 => 16,
        KeyCode::F4 => 17,
        KeyCode::F5 => 18,
        KeyCode::F6 => 19,
        KeyCode::F7 => 20,
        KeyCode::F8 => 21,
        KeyCode::F9 => 22,
        KeyCode::F10 => 23,
        KeyCode::F11 => 24,
        KeyCode::F12 => 25,
        KeyCode::VolumeUp => 26,
        KeyCode::VolumeDown => 27,
        KeyCode::Mute => 28,
        KeyCode::PlayPause => 29,
        KeyCode::Code(_) | KeyCode::Unicode(_) => {
            unreachable!("tagged separately by held_key_for")
        }
    }
}

fn named_key_from_index(index: u32) -> Option<KeyCode> {
    Some(match index {
        0 => KeyCode::Space,
        1 => KeyCode::Return,
        2 => KeyCode::Tab,
        3 => KeyCode::Escape,
        4 => KeyCode::Backspace,
        5 => KeyCode::Delete,
        6 => KeyCode::UpArrow,
        7 => KeyCode::DownArrow,
        8 => KeyCode::LeftArrow,
        9 => KeyCode::RightArrow,
        10 => KeyCode::Home,
        11 => KeyCode::End,
        12 => KeyCode::PageUp,
        13 => KeyCode::PageDown,
        14 => KeyCode::F1,
        15 => KeyCode::F2,
        16 => KeyCode::F3,
        17 => KeyCode::F4,
        18 => KeyCode::F5,
        19 => KeyCode::F6,
        20 => KeyCode::F7,
        21 => KeyCode::F8,
        22 => KeyCode::F9,
        23 => KeyCode::F10,
        24 => KeyCode::F11,
        25 => KeyCode::F12,
        26 => KeyCode::VolumeUp,
        27 => KeyCode::VolumeDown,
        28 => KeyCode::Mute,
        29 => KeyCode::PlayPause,
        _ => return None,
    })
}

/// Internal state key under which a held gamepad button is tracked (§4.6
/// `*Btn<idx>_<name>`).
pub fn held_button_for(controller_index: u8, button: GamepadButton) -> String {
    format!("*Btn{controller_index}_{}", button.0)
}

/// Recovers the `(controllerIndex, GamepadButton)` a [`held_button_for`]
/// string was derived from, for the profile-swap/shutdown release path.
pub fn gamepad_button_from_held_key(held_key: &str) -> Option<(u8, GamepadButton)> {
    let rest = held_key.strip_prefix("*Btn")?;
    let (idx, code) = rest.split_once('_')?;
    Some((idx.parse().ok()?, GamepadButton(code.parse().ok()?)))
}

/// Reverses the sink-side effect of a tracked held resource (a pressed key or
/// gamepad button) and clears its bookkeeping entry. Used wherever a held
/// resource must be released without the inverse action having been
/// dispatched explicitly: profile swap and shutdown (§4.6, §4.9 step 3, §8
/// scenario 7). `*Alt<id>` toggle entries carry no sink-side effect, so they
/// are just dropped from the state map.
pub async fn release_held_resource(ctx: &ExecutionContext, held_key: &str) {
    if let Some(key) = key_code_from_held_key(held_key) {
        if let Err(e) = ctx.keyboard.key_up(key).await {
            tracing::warn!(key = held_key, error = %e, "failed to release held key on swap/shutdown");
        }
    } else if let Some((controller_index, button)) = gamepad_button_from_held_key(held_key) {
        if let Err(e) = ctx.gamepad.set_button(controller_index, button, false).await {
            tracing::warn!(key = held_key, error = %e, "failed to release held gamepad button on swap/shutdown");
        }
    }
    ctx.state.release_held(held_key);
}

fn execute_gamepad_button(
    ctx: &ExecutionContext,
    controller_index: u8,
    button: GamepadButton,
    press_type: PressType,
) -> Result<(), ActionError> {
    if !ctx.gamepad.available() {
        tracing::warn!("gamepad sink unavailable, ignoring GameControllerButton action");
        return Ok(());
    }
    let held_key = held_button_for(controller_index, button);
    match press_type {
        PressType::Press => {
            futures_lite_block_on(ctx.gamepad.set_button(controller_index, button, true))?;
            ctx.state.record_held(&held_key)?;
            Ok(())
        }
        PressType::Release => {
            futures_lite_block_on(ctx.gamepad.set_button(controller_index, button, false))?;
            ctx.state.release_held(&held_key);
            Ok(())
        }
        PressType::PressRelease => {
            futures_lite_block_on(ctx.gamepad.set_button(controller_index, button, true))?;
            futures_lite_block_on(ctx.gamepad.set_button(controller_index, button, false))
        }
    }
}

/// Value mapping rules for `GameControllerAxis` in `MidiMapped` mode (§4.10).
pub fn map_axis_value(axis: GamepadAxis, wire_value: i32) -> i32 {
    if axis.is_trigger() {
        (wire_value * 2).clamp(0, 255)
    } else {
        ((wire_value - 64) * 512).clamp(-32768, 32767)
    }
}

fn execute_gamepad_axis(
    ctx: &ExecutionContext,
    controller_index: u8,
    axis: GamepadAxis,
    mode: AxisMode,
    value: Option<i32>,
) -> Result<(), ActionError> {
    if !ctx.gamepad.available() {
        tracing::warn!("gamepad sink unavailable, ignoring GameControllerAxis action");
        return Ok(());
    }
    match mode {
        AxisMode::FixedValue { value, duration_ms } => {
            futures_lite_block_on(ctx.gamepad.set_axis(controller_index, axis, value, duration_ms))
        }
        AxisMode::MidiMapped => {
            let wire_value = value.unwrap_or(64);
            let mapped = map_axis_value(axis, wire_value);
            futures_lite_block_on(ctx.gamepad.set_axis(controller_index, axis, mapped, None))
        }
    }
}

/// Sink methods are declared `async` (for uniformity with `CommandSink` and
/// future suspending backends), but the synchronous path must not actually
/// suspend (§5). Well-behaved sinks resolve immediately; this just polls
/// once rather than pulling in a full executor for the sync path.
fn futures_lite_block_on<F: std::future::Future>(future: F) -> F::Output {
    use std::task::{Context, Poll};

    let waker = noop_waker::waker();
    let mut cx = Context::from_waker(&waker);
    let mut future = Box::pin(future);
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(output) => output,
        Poll::Pending => panic!("synchronous sink future did not resolve immediately"),
    }
}

/// A waker that does nothing when woken, for polling futures that are
/// contractually required to resolve on their first poll (§5 sync path).
mod noop_waker {
    use std::task::{RawWaker, RawWakerVTable, Waker};

    fn no_op(_: *const ()) {}
    fn clone(_: *const ()) -> RawWaker {
        raw_waker()
    }

    fn raw_waker() -> RawWaker {
        const VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    pub fn waker() -> Waker {
        unsafe { Waker::from_raw(raw_waker()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_midi_mapped_center_maps_to_zero() {
        assert_eq!(map_axis_value(GamepadAxis::LeftStickX, 64), 0);
    }

    #[test]
    fn axis_trigger_center_maps_to_128() {
        assert_eq!(map_axis_value(GamepadAxis::LeftTrigger, 64), 128);
    }

    #[test]
    fn held_key_naming_is_stable_for_same_code() {
        assert_eq!(held_key_for(KeyCode::Code(65)), held_key_for(KeyCode::Code(65)));
    }

    #[test]
    fn held_button_key_round_trips() {
        let button = GamepadButton(7);
        let held = held_button_for(2, button);
        assert_eq!(gamepad_button_from_held_key(&held), Some((2, button)));
    }

    #[test]
    fn alt_toggle_key_has_no_sink_side_effect_parse() {
        assert_eq!(key_code_from_held_key("*Alt123"), None);
        assert_eq!(gamepad_button_from_held_key("*Alt123"), None);
    }

    #[test]
    fn trigger_only_action_has_trigger_category_only() {
        let action = Action::new_key_press_release("test", KeyCode::Space);
        let cats = action.compatible_input_categories();
        assert!(cats.contains(&InputCategory::Trigger));
        assert_eq!(cats.len(), 1);
    }
}
