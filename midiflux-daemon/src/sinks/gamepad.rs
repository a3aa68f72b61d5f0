// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Gamepad sink (C10): no virtual-controller driver crate (vgamepad,
//! vigem-client) appears anywhere in the retrieved pack, so this sink is an
//! injectable [`VirtualGamepadBackend`] trait with a logging-only default
//! implementation (§12 "external collaborator shims"). A real backend can be
//! plugged in later without touching the dispatcher or `midiflux_core`.

use async_trait::async_trait;
use midiflux_core::action::{GamepadAxis, GamepadButton, GamepadSink};
use midiflux_core::error::ActionError;
use tracing::warn;

/// Abstraction over a real virtual-controller driver. Kept separate from
/// [`GamepadSink`] so a future backend only needs to implement this narrower
/// surface, not the core trait's `async_trait` plumbing.
pub trait VirtualGamepadBackend: Send + Sync {
    fn set_button(&self, controller_index: u8, button: GamepadButton, pressed: bool) -> Result<(), ActionError>;
    fn set_axis(&self, controller_index: u8, axis: GamepadAxis, value: i32, duration_ms: Option<u64>) -> Result<(), ActionError>;
    fn available(&self) -> bool;
}

/// Default backend: logs every call at `warn` and reports itself
/// unavailable. Lets profiles that reference gamepad actions load and run
/// without a real driver present, consistent with the rest of this
/// repository's "sinks degrade, they don't crash the dispatcher" posture.
#[derive(Debug, Default)]
pub struct LoggingGamepadBackend;

impl VirtualGamepadBackend for LoggingGamepadBackend {
    fn set_button(&self, controller_index: u8, button: GamepadButton, pressed: bool) -> Result<(), ActionError> {
        warn!(
            controller_index,
            button = button.0,
            pressed,
            "no virtual gamepad backend installed; dropping button event"
        );
        Ok(())
    }

    fn set_axis(&self, controller_index: u8, axis: GamepadAxis, value: i32, duration_ms: Option<u64>) -> Result<(), ActionError> {
        warn!(
            controller_index,
            ?axis,
            value,
            ?duration_ms,
            "no virtual gamepad backend installed; dropping axis event"
        );
        Ok(())
    }

    fn available(&self) -> bool {
        false
    }
}

pub struct VirtualGamepadSink {
    backend: Box<dyn VirtualGamepadBackend>,
}

impl VirtualGamepadSink {
    pub fn new(backend: Box<dyn VirtualGamepadBackend>) -> Self {
        VirtualGamepadSink { backend }
    }
}

impl Default for VirtualGamepadSink {
    fn default() -> Self {
        VirtualGamepadSink::new(Box::new(LoggingGamepadBackend))
    }
}

#[async_trait]
impl GamepadSink for VirtualGamepadSink {
    async fn set_button(
        &self,
        controller_index: u8,
        button: GamepadButton,
        pressed: bool,
    ) -> Result<(), ActionError> {
        self.backend.set_button(controller_index, button, pressed)
    }

    async fn set_axis(
        &self,
        controller_index: u8,
        axis: GamepadAxis,
        raw_value: i32,
        duration_ms: Option<u64>,
    ) -> Result<(), ActionError> {
        self.backend.set_axis(controller_index, axis, raw_value, duration_ms)
    }

    fn available(&self) -> bool {
        self.backend.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_backend_reports_unavailable_but_does_not_error() {
        let sink = VirtualGamepadSink::default();
        assert!(!sink.available());
        sink.set_button(0, GamepadButton(5), true).await.unwrap();
        sink.set_axis(0, GamepadAxis::LeftStickX, 64, None).await.unwrap();
    }
}
