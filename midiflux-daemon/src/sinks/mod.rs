// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Effect sinks (C10): the concrete, OS-facing implementations of the
//! trait contracts `midiflux_core::action` declares. Each sink is kept
//! intentionally thin — the point of this repository is the CORE pipeline,
//! not production hardware bindings.

pub mod audio;
pub mod command;
pub mod gamepad;
pub mod keyboard;
pub mod midi;
pub mod mouse;

pub use audio::{NullAudioSink, RodioAudioSink};
pub use command::ProcessCommandSink;
pub use gamepad::{LoggingGamepadBackend, VirtualGamepadBackend, VirtualGamepadSink};
pub use keyboard::EnigoKeyboardSink;
pub use midi::{MidiInputHub, MidirOutputSink};
pub use mouse::EnigoMouseSink;
