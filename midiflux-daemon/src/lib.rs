// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! MIDIFlux daemon: the async runtime that wraps `midiflux_core`.
//!
//! Owns the dispatcher (C8), the profile controller (C9), the concrete
//! effect sinks (C10) and their external-collaborator bindings (MIDI I/O,
//! input injection, virtual gamepad, process spawning, audio), structured
//! logging bootstrap, and the management surface (§6/§13) exposed as a
//! request/response envelope over a local Unix-domain socket.

pub mod daemon;
pub mod sinks;

pub use daemon::{DaemonError, Dispatcher, IpcServer, ProfileController, Result as DaemonResult};
