// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Canonical MIDI event representation and wire normalization.
//!
//! Everything above this module speaks in 1-based channels and decoded
//! [`InputType`] variants; the 0-based wire convention and raw `midi_msg`
//! bytes are confined here.

use midi_msg::{ChannelVoiceMsg, ControlChange, MidiMsg};
use serde::{Deserialize, Serialize};

/// Trigger shape of a MIDI event, independent of channel or number.
///
/// `ControlChangeAbsolute` and `ControlChangeRelative` decode identically off
/// the wire (both are plain Control Change messages); which one an incoming
/// CC is treated as is decided by the mapping registry lookup, not by this
/// module (see `registry::Registry::lookup_control_change`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub enum InputType {
    NoteOn,
    NoteOff,
    ControlChangeAbsolute,
    ControlChangeRelative,
    ProgramChange,
    PitchBend,
    Aftertouch,
    ChannelPressure,
    SysEx,
}

impl InputType {
    /// Which of the raw wire message kinds a `ControlChange*` type shares.
    pub fn is_control_change(self) -> bool {
        matches!(
            self,
            InputType::ControlChangeAbsolute | InputType::ControlChangeRelative
        )
    }
}

/// Value-category an input carries, used to validate action compatibility
/// at profile load (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputCategory {
    Trigger,
    AbsoluteValue,
    RelativeValue,
}

impl InputType {
    /// The category of value this input type delivers to its action, for
    /// the `ControlChangeAbsolute`/`Relative` split this assumes the caller
    /// already resolved which of the two applies.
    pub fn category(self) -> InputCategory {
        match self {
            InputType::NoteOn
            | InputType::NoteOff
            | InputType::ProgramChange
            | InputType::Aftertouch
            | InputType::ChannelPressure
            | InputType::SysEx => InputCategory::Trigger,
            InputType::ControlChangeAbsolute | InputType::PitchBend => {
                InputCategory::AbsoluteValue
            }
            InputType::ControlChangeRelative => InputCategory::RelativeValue,
        }
    }
}

/// A MIDI channel selector: either a concrete 1..16 channel or a wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// 1-based channel number, 1..=16.
    Exact(u8),
    Any,
}

impl Channel {
    pub fn from_wire(wire: u8) -> Self {
        Channel::Exact(wire.saturating_add(1).min(16))
    }
}

/// A single decoded, normalized MIDI event. Transient by design: it is never
/// stored past the dispatch that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiEvent {
    pub kind: InputType,
    /// `Any` only ever occurs for `SysEx`; all other kinds always carry a
    /// concrete channel.
    pub channel: Channel,
    /// Note number or controller/program number; absent for `SysEx` and
    /// `PitchBend`.
    pub number: Option<u8>,
    /// 7-bit value for most kinds; for `PitchBend` the full 14-bit value
    /// (0..16383, center 8192).
    pub value: Option<u16>,
    pub sysex: Vec<u8>,
}

impl MidiEvent {
    /// Decode a raw `midi_msg` channel-voice message into a normalized
    /// [`MidiEvent`], applying the NoteOn velocity=0 -> NoteOff rule.
    ///
    /// `wire_channel` is the 0-based channel carried by the wire message.
    pub fn from_channel_voice(wire_channel: u8, msg: &ChannelVoiceMsg) -> Option<MidiEvent> {
        let channel = Channel::from_wire(wire_channel);
        let event = match msg.clone() {
            ChannelVoiceMsg::NoteOn { note, velocity } => {
                if velocity == 0 {
                    MidiEvent {
                        kind: InputType::NoteOff,
                        channel,
                        number: Some(note),
                        value: Some(0),
                        sysex: Vec::new(),
                    }
                } else {
                    MidiEvent {
                        kind: InputType::NoteOn,
                        channel,
                        number: Some(note),
                        value: Some(velocity as u16),
                        sysex: Vec::new(),
                    }
                }
            }
            ChannelVoiceMsg::NoteOff { note, velocity } => MidiEvent {
                kind: InputType::NoteOff,
                channel,
                number: Some(note),
                value: Some(velocity as u16),
                sysex: Vec::new(),
            },
            ChannelVoiceMsg::ControlChange { control } => {
                let ControlChange::CC { control: number, value } = control else {
                    return None;
                };
                MidiEvent {
                    // Resolved to Absolute vs Relative by the registry at
                    // lookup time; tag as Absolute here as a neutral default.
                    kind: InputType::ControlChangeAbsolute,
                    channel,
                    number: Some(number),
                    value: Some(value as u16),
                    sysex: Vec::new(),
                }
            }
            ChannelVoiceMsg::ProgramChange { program } => MidiEvent {
                kind: InputType::ProgramChange,
                channel,
                number: Some(program),
                value: None,
                sysex: Vec::new(),
            },
            ChannelVoiceMsg::PitchBend { bend } => MidiEvent {
                kind: InputType::PitchBend,
                channel,
                number: None,
                value: Some(bend),
                sysex: Vec::new(),
            },
            ChannelVoiceMsg::ChannelPressure { pressure } => MidiEvent {
                kind: InputType::ChannelPressure,
                channel,
                number: None,
                value: Some(pressure as u16),
                sysex: Vec::new(),
            },
            ChannelVoiceMsg::PolyPressure { note, pressure } => MidiEvent {
                kind: InputType::Aftertouch,
                channel,
                number: Some(note),
                value: Some(pressure as u16),
                sysex: Vec::new(),
            },
            _ => return None,
        };
        Some(event)
    }

    /// Decode a raw SysEx payload. Always channel-`Any` (§4.2).
    pub fn from_sysex(bytes: Vec<u8>) -> MidiEvent {
        MidiEvent {
            kind: InputType::SysEx,
            channel: Channel::Any,
            number: None,
            value: None,
            sysex: bytes,
        }
    }

    /// Best-effort decode of a full `MidiMsg` arriving from `midi-msg`.
    pub fn from_midi_msg(wire_channel: u8, msg: &MidiMsg) -> Option<MidiEvent> {
        match msg {
            MidiMsg::ChannelVoice { msg, .. } => MidiEvent::from_channel_voice(wire_channel, msg),
            MidiMsg::RunningChannelVoice { msg, .. } => {
                MidiEvent::from_channel_voice(wire_channel, msg)
            }
            MidiMsg::SystemExclusive { .. } => {
                Some(MidiEvent::from_sysex(msg.to_midi().unwrap_or_default()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_velocity_zero_becomes_note_off() {
        let msg = ChannelVoiceMsg::NoteOn {
            note: 60,
            velocity: 0,
        };
        let event = MidiEvent::from_channel_voice(0, &msg).unwrap();
        assert_eq!(event.kind, InputType::NoteOff);
        assert_eq!(event.number, Some(60));
        assert_eq!(event.value, Some(0));
    }

    #[test]
    fn note_on_nonzero_velocity_stays_note_on() {
        let msg = ChannelVoiceMsg::NoteOn {
            note: 60,
            velocity: 100,
        };
        let event = MidiEvent::from_channel_voice(0, &msg).unwrap();
        assert_eq!(event.kind, InputType::NoteOn);
        assert_eq!(event.value, Some(100));
    }

    #[test]
    fn wire_channel_is_one_based_externally() {
        assert_eq!(Channel::from_wire(0), Channel::Exact(1));
        assert_eq!(Channel::from_wire(15), Channel::Exact(16));
    }

    #[test]
    fn sysex_is_channel_any() {
        let event = MidiEvent::from_sysex(vec![0xF0, 0x7E, 0xF7]);
        assert_eq!(event.channel, Channel::Any);
        assert_eq!(event.kind, InputType::SysEx);
    }
}
