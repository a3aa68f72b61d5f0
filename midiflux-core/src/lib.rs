// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! MIDIFlux core: the event-to-action pipeline.
//!
//! This crate holds everything that is UI- and OS-independent: the MIDI
//! event model (C2), the mapping registry (C3), the polymorphic action model
//! and its composite variants (C4/C5), the profile-scoped state manager (C6),
//! the relative-CC decoder (C7), and the profile config schema/validation
//! (§6). Dispatch (C8), profile loading against real hardware (C9), and the
//! concrete effect sinks (C10) live in `midiflux-daemon`, which depends on
//! this crate.

pub mod action;
pub mod composite;
pub mod config;
pub mod error;
pub mod logging;
pub mod midi;
pub mod model;
pub mod registry;
pub mod relative_cc;
pub mod state;

pub use error::{ActionError, ConfigError, DeviceError, EngineError, StateError};
pub use model::{ActionId, DeviceIdentity, Profile};
pub use registry::{Registry, RegistryHandle};
pub use state::StateManager;
