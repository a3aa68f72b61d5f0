// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Mouse sink (C10): `enigo`-backed click/scroll synthesis.

use async_trait::async_trait;
use enigo::{Axis, Button, Direction, Enigo, Mouse, Settings};
use midiflux_core::action::{MouseButton, MouseSink, ScrollDirection};
use midiflux_core::error::ActionError;
use std::sync::Mutex;
use tracing::trace;

pub struct EnigoMouseSink {
    enigo: Mutex<Enigo>,
}

impl EnigoMouseSink {
    pub fn new() -> Result<Self, ActionError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| ActionError::OsRefused(format!("failed to initialize enigo: {e}")))?;
        Ok(EnigoMouseSink {
            enigo: Mutex::new(enigo),
        })
    }
}

fn map_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

#[async_trait]
impl MouseSink for EnigoMouseSink {
    async fn click(&self, button: MouseButton) -> Result<(), ActionError> {
        trace!(?button, "mouse click");
        let mut enigo = self.enigo.lock().expect("enigo lock poisoned");
        enigo
            .button(map_button(button), Direction::Click)
            .map_err(|e| ActionError::OsRefused(e.to_string()))
    }

    async fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), ActionError> {
        let signed = match direction {
            ScrollDirection::Up => -(amount as i32),
            ScrollDirection::Down => amount as i32,
        };
        trace!(?direction, amount, "mouse scroll");
        let mut enigo = self.enigo.lock().expect("enigo lock poisoned");
        enigo
            .scroll(signed, Axis::Vertical)
            .map_err(|e| ActionError::OsRefused(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_buttons_without_panicking() {
        assert!(matches!(map_button(MouseButton::Left), Button::Left));
        assert!(matches!(map_button(MouseButton::Right), Button::Right));
    }
}
