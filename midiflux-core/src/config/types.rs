// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Wire-format types for the profile file (§6). These mirror the literal
//! JSON shape field-for-field; conversion into the runtime
//! [`crate::model`]/[`crate::action`] types happens in [`super::loader`].
//! Every struct rejects unknown fields, matching §4.4's "refuse unknown
//! fields" requirement on action parameter parsing.

use crate::action::{
    AxisMode, ErrorPolicy, GamepadAxis, GamepadButton, KeyCode, LockKey, MidiMessage, MouseButton,
    PressType, ScrollDirection, ShellKind,
};
use crate::composite::{ComparisonType, ConditionLogic};
use crate::midi::InputType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

fn default_volume() -> u8 {
    100
}

/// Top-level profile document (§6): `{ profileName, description?,
/// initialStates, midiDevices }`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ProfileFile {
    pub profile_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub initial_states: HashMap<String, i32>,
    pub midi_devices: Vec<DeviceConfigFile>,
}

/// `{ deviceName: string | "*", mappings: [ActionMapping] }`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DeviceConfigFile {
    pub device_name: String,
    #[serde(default)]
    pub mappings: Vec<ActionMappingFile>,
}

/// `{ id?, description?, enabled?=true, inputType, channel, note|controlNumber,
/// action }`. `number` accepts either the `note` or `controlNumber` field
/// name on the wire since both mean the same thing to the registry (§3
/// `MidiInput.inputNumber`).
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ActionMappingFile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub input_type: InputType,
    /// `1..=16`, or `null` for the `Any` wildcard channel.
    #[serde(default)]
    pub channel: Option<u8>,
    #[serde(default, alias = "note", alias = "controlNumber")]
    pub number: Option<u8>,
    pub action: ActionFile,
}

/// The tagged-union action parameter bag (§4.4/§4.5). Field names match §6's
/// camelCase wire convention; the discriminator is the bare Rust variant
/// name (`KeyPressRelease`, `Sequence`, ...).
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase", deny_unknown_fields)]
pub enum ActionFile {
    KeyPressRelease {
        key: KeyCode,
    },
    KeyDown {
        key: KeyCode,
        #[serde(default)]
        auto_release_ms: Option<u64>,
    },
    KeyUp {
        key: KeyCode,
    },
    KeyToggle {
        key: LockKey,
    },
    MouseClick {
        button: MouseButton,
    },
    MouseScroll {
        direction: ScrollDirection,
        amount: u32,
    },
    CommandExecution {
        command: String,
        #[serde(default)]
        shell_kind: ShellKind,
        #[serde(default)]
        hide_console: bool,
        #[serde(default)]
        wait_for_exit: bool,
    },
    Delay {
        ms: u64,
    },
    GameControllerButton {
        controller_index: u8,
        button: GamepadButton,
        press_type: PressType,
    },
    GameControllerAxis {
        controller_index: u8,
        axis: GamepadAxis,
        mode: AxisMode,
    },
    MidiOutput {
        output_device_name: String,
        commands: Vec<MidiMessage>,
    },
    PlaySound {
        file_path: String,
        #[serde(default = "default_volume")]
        volume: u8,
        #[serde(default)]
        audio_device: Option<String>,
    },
    Sequence {
        sub_actions: Vec<ActionFile>,
        error_policy: ErrorPolicy,
    },
    Conditional {
        conditions: Vec<ValueConditionFile>,
    },
    StateConditional {
        state_key: String,
        comparison_type: ComparisonType,
        comparison_value: i32,
        #[serde(default)]
        logic: ConditionLogic,
        #[serde(default)]
        conditions: Vec<StateConditionFile>,
        true_action: Box<ActionFile>,
        #[serde(default)]
        false_action: Option<Box<ActionFile>>,
    },
    Alternating {
        first_action: Box<ActionFile>,
        second_action: Box<ActionFile>,
        #[serde(default = "default_true")]
        start_with_first: bool,
    },
    RelativeCC {
        increase_action: Box<ActionFile>,
        decrease_action: Box<ActionFile>,
    },
}

/// One branch of a `Conditional`'s value-range list.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ValueConditionFile {
    pub min_value: i32,
    pub max_value: i32,
    pub action: ActionFile,
    #[serde(default)]
    pub description: Option<String>,
}

/// One entry of a `StateConditional`'s `conditions` list, used only when
/// `logic: And`. `logic: Single` instead evaluates the action's own flat
/// `stateKey`/`comparisonType`/`comparisonValue` fields (§4.5).
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StateConditionFile {
    pub state_key: String,
    pub comparison_type: ComparisonType,
    pub comparison_value: i32,
}
