// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Runtime data model for profiles, devices, and mapping keys (§3).

use crate::action::Action;
use crate::midi::{Channel, InputType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, stable identity assigned to an action at construction. Used for
/// error reporting and for deriving internal state keys (`*Alt<id>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub Uuid);

impl ActionId {
    pub fn new() -> Self {
        ActionId(Uuid::new_v4())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device identity as observed by the MIDI input abstraction (C1). The id is
/// not guaranteed stable across a disconnect/reconnect cycle; `name` is the
/// key used for mapping and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
}

/// A device selector as it appears in a mapping key: either a literal device
/// name or the `Any` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceSelector {
    Exact(String),
    Any,
}

impl DeviceSelector {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            DeviceSelector::Exact(s) => s == name,
            DeviceSelector::Any => true,
        }
    }
}

/// The mapping key (§3 `MidiInput`): what an incoming event must match for a
/// mapping to fire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MidiInput {
    pub device: DeviceSelector,
    pub channel: Channel,
    pub input_type: InputType,
    pub input_number: Option<u8>,
}

/// A single binding from a [`MidiInput`] to an [`Action`]. Immutable after
/// registry publication.
#[derive(Debug, Clone)]
pub struct ActionMapping {
    pub id: Option<String>,
    pub description: Option<String>,
    pub enabled: bool,
    pub input: MidiInput,
    pub action: Action,
}

/// Mappings scoped to a single device name or the `*` wildcard.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub device_name: DeviceSelector,
    pub mappings: Vec<ActionMapping>,
}

/// A complete, loadable profile (§3 `Profile`).
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub description: Option<String>,
    pub initial_states: std::collections::HashMap<String, i32>,
    pub devices: Vec<DeviceConfig>,
}

impl Profile {
    /// An empty profile: no devices, no initial states. Used as the
    /// "retain previous profile" fallback is never needed for this, but is
    /// handy for tests and for representing "no profile loaded yet".
    pub fn empty(name: impl Into<String>) -> Self {
        Profile {
            name: name.into(),
            description: None,
            initial_states: std::collections::HashMap::new(),
            devices: Vec::new(),
        }
    }

    /// Flatten all mappings across devices, tagging each with its owning
    /// device selector (mappings don't carry their own device name; that
    /// lives on the enclosing `DeviceConfig`).
    pub fn all_mappings(&self) -> impl Iterator<Item = (&DeviceSelector, &ActionMapping)> {
        self.devices
            .iter()
            .flat_map(|d| d.mappings.iter().map(move |m| (&d.device_name, m)))
    }
}
