// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Profile file format (§6): schema-validated JSON, tagged-union actions,
//! `deny_unknown_fields` throughout. This module only defines the wire
//! shape and the load path (`loader::load_profile`); the runtime types it
//! builds live in [`crate::model`] and [`crate::action`].

pub mod loader;
pub mod schema;
pub mod types;

pub use loader::load_profile;
pub use schema::{action_schema, profile_schema, supported_action_kinds, supported_input_types};
pub use types::{ActionFile, ActionMappingFile, DeviceConfigFile, ProfileFile};
