// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Keyboard sink (C10): `enigo`-backed key synthesis behind the async
//! `KeyboardSink` contract. Held-key bookkeeping lives in
//! `midiflux_core::state::StateManager`, not here — this sink only issues
//! the OS-level press/release.

use async_trait::async_trait;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use midiflux_core::action::{KeyCode, KeyboardSink, LockKey};
use midiflux_core::error::ActionError;
use std::sync::Mutex;
use tracing::{trace, warn};

/// `enigo::Enigo` is not `Sync`; one instance is shared behind a mutex and
/// reused across key-down/up calls rather than constructed per action.
pub struct EnigoKeyboardSink {
    enigo: Mutex<Enigo>,
}

impl EnigoKeyboardSink {
    pub fn new() -> Result<Self, ActionError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| ActionError::OsRefused(format!("failed to initialize enigo: {e}")))?;
        Ok(EnigoKeyboardSink {
            enigo: Mutex::new(enigo),
        })
    }
}

/// Maps the core's platform-independent [`KeyCode`] to a concrete
/// `enigo::Key`. Named keys map directly; `Code`/`Unicode` carry through
/// verbatim to enigo's own opaque/unicode variants.
fn map_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Unicode(c) => Key::Unicode(c),
        KeyCode::Space => Key::Space,
        KeyCode::Return => Key::Return,
        KeyCode::Tab => Key::Tab,
        KeyCode::Escape => Key::Escape,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Delete => Key::Delete,
        KeyCode::UpArrow => Key::UpArrow,
        KeyCode::DownArrow => Key::DownArrow,
        KeyCode::LeftArrow => Key::LeftArrow,
        KeyCode::RightArrow => Key::RightArrow,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::F5 => Key::F5,
        KeyCode::F6 => Key::F6,
        KeyCode::F7 => Key::F7,
        KeyCode::F8 => Key::F8,
        KeyCode::F9 => Key::F9,
        KeyCode::F10 => Key::F10,
        KeyCode::F11 => Key::F11,
        KeyCode::F12 => Key::F12,
        KeyCode::VolumeUp => Key::VolumeUp,
        KeyCode::VolumeDown => Key::VolumeDown,
        KeyCode::Mute => Key::VolumeMute,
        KeyCode::PlayPause => Key::MediaPlayPause,
        KeyCode::Code(raw) => Key::Other(raw),
    }
}

fn map_lock_key(key: LockKey) -> Key {
    match key {
        LockKey::CapsLock => Key::CapsLock,
        LockKey::NumLock => Key::Numlock,
        LockKey::ScrollLock => Key::ScrollLock,
    }
}

#[async_trait]
impl KeyboardSink for EnigoKeyboardSink {
    async fn key_down(&self, code: KeyCode) -> Result<(), ActionError> {
        trace!(?code, "key_down");
        let mut enigo = self.enigo.lock().expect("enigo lock poisoned");
        enigo
            .key(map_key(code), Direction::Press)
            .map_err(|e| ActionError::OsRefused(e.to_string()))
    }

    async fn key_up(&self, code: KeyCode) -> Result<(), ActionError> {
        trace!(?code, "key_up");
        let mut enigo = self.enigo.lock().expect("enigo lock poisoned");
        enigo
            .key(map_key(code), Direction::Release)
            .map_err(|e| ActionError::OsRefused(e.to_string()))
    }

    async fn key_toggle(&self, key: LockKey) -> Result<(), ActionError> {
        // The OS owns lock-key semantics; a single click toggles it.
        let mut enigo = self.enigo.lock().expect("enigo lock poisoned");
        enigo
            .key(map_lock_key(key), Direction::Click)
            .map_err(|e| {
                warn!(?key, error = %e, "lock key toggle refused by OS");
                ActionError::OsRefused(e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_named_keys_without_panicking() {
        let _ = map_key(KeyCode::Space);
        let _ = map_key(KeyCode::F12);
        let _ = map_key(KeyCode::Code(65));
        let _ = map_lock_key(LockKey::CapsLock);
    }
}
