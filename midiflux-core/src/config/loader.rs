// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Converts the wire-format [`super::types`] into the runtime [`crate::model`]
//! and [`crate::action`] types, and validates the result (§4.4, §7).
//!
//! Every action node is assigned a fresh [`ActionId`] here; the wire format
//! never carries one. Validation collects every error it finds rather than
//! stopping at the first, so a profile author sees the whole list in one
//! pass (§7 "validation errors include field path and reason").

use super::types::{
    ActionFile, ActionMappingFile, DeviceConfigFile, ProfileFile, StateConditionFile,
    ValueConditionFile,
};
use crate::action::{Action, ValidationError};
use crate::composite::{Alternating, Conditional, RelativeCc, Sequence, StateCondition, StateConditional, ValueCondition};
use crate::error::ConfigError;
use crate::midi::Channel;
use crate::model::{ActionId, ActionMapping, DeviceConfig, DeviceSelector, MidiInput, Profile};
use crate::state::is_valid_user_key;

/// Parse and validate a profile document (§6). On success, every action in
/// the returned [`Profile`] has already passed [`Action::validate`] and
/// input-category compatibility checks.
pub fn load_profile(json: &str) -> Result<Profile, ConfigError> {
    let file: ProfileFile = serde_json::from_str(json)?;
    let profile = convert_profile(file);

    let errors = validate_profile(&profile);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    Ok(profile)
}

fn convert_profile(file: ProfileFile) -> Profile {
    Profile {
        name: file.profile_name,
        description: file.description,
        initial_states: file.initial_states,
        devices: file.midi_devices.into_iter().map(convert_device).collect(),
    }
}

fn convert_device(file: DeviceConfigFile) -> DeviceConfig {
    DeviceConfig {
        device_name: device_selector(&file.device_name),
        mappings: file.mappings.into_iter().map(convert_mapping).collect(),
    }
}

fn device_selector(name: &str) -> DeviceSelector {
    if name == "*" {
        DeviceSelector::Any
    } else {
        DeviceSelector::Exact(name.to_string())
    }
}

fn convert_mapping(file: ActionMappingFile) -> ActionMapping {
    let channel = match file.channel {
        Some(n) => Channel::Exact(n),
        None => Channel::Any,
    };
    ActionMapping {
        id: file.id,
        description: file.description,
        enabled: file.enabled,
        input: MidiInput {
            // The device selector lives one level up on `DeviceConfig`; a
            // mapping only needs the channel/type/number triple to match.
            device: DeviceSelector::Any,
            channel,
            input_type: file.input_type,
            input_number: file.number,
        },
        action: convert_action(file.action),
    }
}

fn convert_action(file: ActionFile) -> Action {
    match file {
        ActionFile::KeyPressRelease { key } => Action::KeyPressRelease {
            id: ActionId::new(),
            key,
        },
        ActionFile::KeyDown { key, auto_release_ms } => Action::KeyDown {
            id: ActionId::new(),
            key,
            auto_release_ms,
        },
        ActionFile::KeyUp { key } => Action::KeyUp {
            id: ActionId::new(),
            key,
        },
        ActionFile::KeyToggle { key } => Action::KeyToggle {
            id: ActionId::new(),
            key,
        },
        ActionFile::MouseClick { button } => Action::MouseClick {
            id: ActionId::new(),
            button,
        },
        ActionFile::MouseScroll { direction, amount } => Action::MouseScroll {
            id: ActionId::new(),
            direction,
            amount,
        },
        ActionFile::CommandExecution {
            command,
            shell_kind,
            hide_console,
            wait_for_exit,
        } => Action::CommandExecution {
            id: ActionId::new(),
            command,
            shell_kind,
            hide_console,
            wait_for_exit,
        },
        ActionFile::Delay { ms } => Action::Delay {
            id: ActionId::new(),
            ms,
        },
        ActionFile::GameControllerButton {
            controller_index,
            button,
            press_type,
        } => Action::GameControllerButton {
            id: ActionId::new(),
            controller_index,
            button,
            press_type,
        },
        ActionFile::GameControllerAxis {
            controller_index,
            axis,
            mode,
        } => Action::GameControllerAxis {
            id: ActionId::new(),
            controller_index,
            axis,
            mode,
        },
        ActionFile::MidiOutput {
            output_device_name,
            commands,
        } => Action::MidiOutput {
            id: ActionId::new(),
            output_device_name,
            commands,
        },
        ActionFile::PlaySound {
            file_path,
            volume,
            audio_device,
        } => Action::PlaySound {
            id: ActionId::new(),
            file_path,
            volume,
            audio_device,
        },
        ActionFile::Sequence {
            sub_actions,
            error_policy,
        } => Action::Sequence(Sequence {
            id: ActionId::new(),
            sub_actions: sub_actions.into_iter().map(convert_action).collect(),
            error_policy,
        }),
        ActionFile::Conditional { conditions } => Action::Conditional(Conditional {
            id: ActionId::new(),
            conditions: conditions.into_iter().map(convert_value_condition).collect(),
        }),
        ActionFile::StateConditional {
            state_key,
            comparison_type,
            comparison_value,
            logic,
            conditions,
            true_action,
            false_action,
        } => Action::StateConditional(StateConditional {
            id: ActionId::new(),
            conditions: state_conditions(state_key, comparison_type, comparison_value, logic, conditions),
            logic,
            true_action: Box::new(convert_action(*true_action)),
            false_action: false_action.map(|a| Box::new(convert_action(*a))),
        }),
        ActionFile::Alternating {
            first_action,
            second_action,
            start_with_first,
        } => Action::Alternating(Alternating {
            id: ActionId::new(),
            first_action: Box::new(convert_action(*first_action)),
            second_action: Box::new(convert_action(*second_action)),
            start_with_first,
        }),
        ActionFile::RelativeCC {
            increase_action,
            decrease_action,
        } => Action::RelativeCc(RelativeCc {
            id: ActionId::new(),
            increase_action: Box::new(convert_action(*increase_action)),
            decrease_action: Box::new(convert_action(*decrease_action)),
        }),
    }
}

fn convert_value_condition(file: ValueConditionFile) -> ValueCondition {
    ValueCondition {
        min_value: file.min_value,
        max_value: file.max_value,
        action: convert_action(file.action),
        description: file.description,
    }
}

/// `logic: And` uses the `conditions` list verbatim; `logic: Single` ignores
/// it and uses the action's own flat `stateKey`/`comparisonType`/
/// `comparisonValue` fields as the sole entry (§4.5). The internal model
/// always carries a non-empty `conditions` list regardless of which wire
/// shape the author used.
fn state_conditions(
    state_key: String,
    comparison_type: crate::composite::ComparisonType,
    comparison_value: i32,
    logic: crate::composite::ConditionLogic,
    conditions: Vec<StateConditionFile>,
) -> Vec<StateCondition> {
    use crate::composite::ConditionLogic;
    match logic {
        ConditionLogic::And if !conditions.is_empty() => conditions
            .into_iter()
            .map(|c| StateCondition {
                state_key: c.state_key,
                comparison_type: c.comparison_type,
                comparison_value: c.comparison_value,
            })
            .collect(),
        _ => vec![StateCondition {
            state_key,
            comparison_type,
            comparison_value,
        }],
    }
}

fn validate_profile(profile: &Profile) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for key in profile.initial_states.keys() {
        if !is_valid_user_key(key) {
            errors.push(ValidationError::new(
                format!("initialStates.{key}"),
                "key must match ^[A-Za-z0-9]+$",
            ));
        }
    }

    for device in &profile.devices {
        for (i, mapping) in device.mappings.iter().enumerate() {
            let path = format!("midiDevices[].mappings[{i}]");
            errors.extend(mapping.action.validate(&format!("{path}.action"), 0));

            let category = mapping.input.input_type.category();
            let compatible = mapping.action.compatible_input_categories();
            if !compatible.is_empty() && !compatible.contains(&category) {
                errors.push(ValidationError::new(
                    path,
                    format!(
                        "action is not compatible with input type {:?} ({:?})",
                        mapping.input.input_type, category
                    ),
                ));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_valid_profile() {
        let json = r#"{
            "profileName": "Test",
            "initialStates": { "mode": 0 },
            "midiDevices": [
                {
                    "deviceName": "*",
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
        let profile = load_profile(json).expect("profile should load");
        assert_eq!(profile.name, "Test");
        assert_eq!(profile.devices.len(), 1);
        assert_eq!(profile.devices[0].mappings.len(), 1);
        assert!(matches!(
            profile.devices[0].mappings[0].action,
            Action::KeyPressRelease { .. }
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        let json = r#"{
            "profileName": "Test",
            "initialStates": {},
            "midiDevices": [],
            "bogusField": 1
        }"#;
        assert!(load_profile(json).is_err());
    }

    #[test]
    fn rejects_invalid_initial_state_key() {
        let json = r#"{
            "profileName": "Test",
            "initialStates": { "not valid!": 0 },
            "midiDevices": []
        }"#;
        match load_profile(json) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.path.contains("initialStates")));
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_incompatible_action_input_pairing() {
        // A RelativeCC action bound to a NoteOn trigger input makes no sense:
        // there is no delta value to decode.
        let json = r#"{
            "profileName": "Test",
            "initialStates": {},
            "midiDevices": [
                {
                    "deviceName": "*",
                    "mappings": [
                        {
                            "inputType": "NoteOn",
                            "channel": 1,
                            "note": 60,
                            "action": {
                                "type": "RelativeCC",
                                "increaseAction": { "type": "KeyPressRelease", "key": "Space" },
                                "decreaseAction": { "type": "KeyPressRelease", "key": "Return" }
                            }
                        }
                    ]
                }
            ]
        }"#;
        match load_profile(json) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.reason.contains("not compatible")));
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn single_logic_state_conditional_uses_flat_fields() {
        let json = r#"{
            "profileName": "Test",
            "initialStates": { "mode": 0 },
            "midiDevices": [
                {
                    "deviceName": "*",
                    "mappings": [
                        {
                            "inputType": "NoteOn",
                            "channel": 1,
                            "note": 36,
                            "action": {
                                "type": "StateConditional",
                                "stateKey": "mode",
                                "comparisonType": "Equals",
                                "comparisonValue": 1,
                                "trueAction": { "type": "KeyPressRelease", "key": "Space" }
                            }
                        }
                    ]
                }
            ]
        }"#;
        let profile = load_profile(json).expect("profile should load");
        let Action::StateConditional(sc) = &profile.devices[0].mappings[0].action else {
            panic!("expected a StateConditional action");
        };
        assert_eq!(sc.conditions.len(), 1);
        assert_eq!(sc.conditions[0].state_key, "mode");
    }

    #[test]
    fn device_wildcard_selector_round_trips() {
        assert_eq!(device_selector("*"), DeviceSelector::Any);
        assert_eq!(
            device_selector("Launchpad"),
            DeviceSelector::Exact("Launchpad".to_string())
        );
    }
}
