// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Capability and schema queries (§6, §13): what action kinds, input kinds,
//! and profile shape the daemon supports, exposed as JSON Schema via
//! `schemars` rather than a hand-maintained description string.

use super::types::{ActionFile, ProfileFile};
use schemars::schema::RootSchema;
use schemars::schema_for;

/// The full profile document schema, as seen by an external tool validating
/// a profile file before submitting it for load.
pub fn profile_schema() -> RootSchema {
    schema_for!(ProfileFile)
}

/// The tagged-union action parameter schema, useful on its own for an
/// editor that only needs to validate one mapping's `action` field.
pub fn action_schema() -> RootSchema {
    schema_for!(ActionFile)
}

/// The bare list of supported input trigger kinds (§3 `InputType`), in the
/// wire spelling used by `ActionMappingFile.inputType`.
pub fn supported_input_types() -> Vec<&'static str> {
    vec![
        "NoteOn",
        "NoteOff",
        "ControlChangeAbsolute",
        "ControlChangeRelative",
        "ProgramChange",
        "PitchBend",
        "Aftertouch",
        "ChannelPressure",
        "SysEx",
    ]
}

/// The bare list of supported action kinds (§4.4/§4.5), in the wire
/// spelling used by `ActionFile`'s `type` tag.
pub fn supported_action_kinds() -> Vec<&'static str> {
    vec![
        "KeyPressRelease",
        "KeyDown",
        "KeyUp",
        "KeyToggle",
        "MouseClick",
        "MouseScroll",
        "CommandExecution",
        "Delay",
        "GameControllerButton",
        "GameControllerAxis",
        "MidiOutput",
        "PlaySound",
        "Sequence",
        "Conditional",
        "StateConditional",
        "Alternating",
        "RelativeCC",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_schema_has_required_top_level_fields() {
        let schema = profile_schema();
        let root = schema.schema.object.as_ref().expect("object schema");
        assert!(root.required.contains("profileName"));
        assert!(root.required.contains("midiDevices"));
    }

    #[test]
    fn action_schema_builds_without_panicking() {
        let schema = action_schema();
        assert!(schema.schema.object.is_some() || schema.schema.subschemas.is_some());
    }

    #[test]
    fn supported_lists_are_non_empty() {
        assert!(!supported_input_types().is_empty());
        assert!(!supported_action_kinds().is_empty());
    }
}
