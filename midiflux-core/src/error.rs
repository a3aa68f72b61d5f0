// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Profile parse/validation failures. Fatal to the load attempt only; the
/// previously active profile is retained.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("{path}: {reason}")]
    ValidationError { path: String, reason: String },

    #[error("action graph exceeds recursion bound of {bound} at {path}")]
    RecursionBound { path: String, bound: usize },

    /// One or more field-level validation failures collected while loading a
    /// profile (§4.4, §7 "validation errors include field path and reason").
    #[error("{} validation error(s): {}", .0.len(), join_validation_errors(.0))]
    Validation(Vec<crate::action::ValidationError>),
}

fn join_validation_errors(errors: &[crate::action::ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Device open/close/send failures. Logged; dispatch continues; the
/// triggering action fails with `ActionError`.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device not found: {0}")]
    NotFound(String),

    #[error("device inactive: {0}")]
    Inactive(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("invalid message: {0}")]
    Invalid(String),
}

/// Per-action runtime failure. Propagates to composite parents per their
/// error policy; never crosses the dispatcher boundary unhandled.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("OS refused the operation: {0}")]
    OsRefused(String),

    #[error("action {action} failed: {source}")]
    Nested {
        action: String,
        #[source]
        source: Box<ActionError>,
    },
}

/// Invalid state key or operation at runtime. Rejected at the write site;
/// the producer logs and continues.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("key '{0}' is not a valid user key (expected ^[A-Za-z0-9]+$)")]
    InvalidUserKey(String),

    #[error("key '{0}' does not match a recognized internal namespace")]
    UnrecognizedInternalKey(String),
}

/// Top-level engine error, used by the daemon's profile/dispatch lifecycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("action error: {0}")]
    Action(#[from] ActionError),

    #[error("already running")]
    AlreadyRunning,

    #[error("not running")]
    NotRunning,

    #[error("shutdown canceled a pending task")]
    ShutdownCanceled,
}
