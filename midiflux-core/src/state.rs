// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Profile-scoped state manager (C6): integer key/value store with user vs
//! internal key namespaces, plus held-resource tracking so profile swap and
//! shutdown can synthesize releases (§4.6).

use crate::error::StateError;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// `^[A-Za-z0-9]+$`, checked by hand rather than pulling in `regex` for a
/// single alphanumeric-only pattern.
pub(crate) fn is_valid_user_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Recognized internal namespaces (§4.6): `*Key<digits>`, `*Btn<idx>_<name>`,
/// `*Alt<actionId>`. `actionId` and `<name>` are opaque strings here (UUIDs
/// and gamepad button identifiers respectively), so the check only confirms
/// the namespace prefix and basic shape.
fn is_recognized_internal_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix('*') else {
        return false;
    };
    if let Some(digits) = rest.strip_prefix("Key") {
        return !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
    }
    if let Some(suffix) = rest.strip_prefix("Btn") {
        return suffix.contains('_') && !suffix.is_empty();
    }
    if let Some(id) = rest.strip_prefix("Alt") {
        return !id.is_empty();
    }
    false
}

fn validate_key(key: &str) -> Result<(), StateError> {
    if key.starts_with('*') {
        if is_recognized_internal_key(key) {
            Ok(())
        } else {
            Err(StateError::UnrecognizedInternalKey(key.to_string()))
        }
    } else if is_valid_user_key(key) {
        Ok(())
    } else {
        Err(StateError::InvalidUserKey(key.to_string()))
    }
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, i32>,
    held: HashSet<String>,
}

/// Thread-safe map<string, int32>. Individual operations are atomic; a
/// multi-step composite update (e.g. inside a Sequence) is not transactional
/// (§5) — that's enforced by callers, not this type.
#[derive(Default)]
pub struct StateManager {
    inner: RwLock<Inner>,
}

impl StateManager {
    pub fn new() -> Self {
        StateManager::default()
    }

    /// Uninitialized reads return 0 for user keys; internal keys follow the
    /// same default (a held resource that was never recorded reads as 0 /
    /// "not held").
    pub fn get(&self, key: &str) -> i32 {
        self.inner.read().expect("state lock poisoned").values.get(key).copied().unwrap_or(0)
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.read().expect("state lock poisoned").values.contains_key(key)
    }

    pub fn set(&self, key: &str, value: i32) -> Result<(), StateError> {
        validate_key(key)?;
        self.inner.write().expect("state lock poisoned").values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn increase(&self, key: &str, delta: i32) -> Result<(), StateError> {
        validate_key(key)?;
        let mut inner = self.inner.write().expect("state lock poisoned");
        let entry = inner.values.entry(key.to_string()).or_insert(0);
        *entry += delta;
        Ok(())
    }

    pub fn decrease(&self, key: &str, delta: i32) -> Result<(), StateError> {
        validate_key(key)?;
        let mut inner = self.inner.write().expect("state lock poisoned");
        let entry = inner.values.entry(key.to_string()).or_insert(0);
        *entry -= delta;
        Ok(())
    }

    pub fn clear(&self, key: &str) {
        let mut inner = self.inner.write().expect("state lock poisoned");
        inner.values.remove(key);
        inner.held.remove(key);
    }

    /// Used on profile swap and shutdown (§4.9 step 3, §4.6).
    pub fn clear_all(&self) {
        let mut inner = self.inner.write().expect("state lock poisoned");
        inner.values.clear();
        inner.held.clear();
    }

    /// Seed the store from a profile's `initialStates` map. Callers should
    /// `clear_all` first so no residue from the outgoing profile remains.
    pub fn init_from(&self, initial_states: &HashMap<String, i32>) {
        let mut inner = self.inner.write().expect("state lock poisoned");
        for (key, value) in initial_states {
            inner.values.insert(key.clone(), *value);
        }
    }

    /// Records that a held resource (virtual key, gamepad button) is now
    /// open, so it can be released on swap/shutdown even if the inverse
    /// action is never explicitly dispatched.
    pub fn record_held(&self, internal_key: &str) -> Result<(), StateError> {
        validate_key(internal_key)?;
        let mut inner = self.inner.write().expect("state lock poisoned");
        inner.values.insert(internal_key.to_string(), 1);
        inner.held.insert(internal_key.to_string());
        Ok(())
    }

    /// Marks a held resource released. Idempotent: releasing a key that was
    /// already released (or never held, e.g. a late-firing auto-release
    /// timer) is a no-op (§4.6).
    pub fn release_held(&self, internal_key: &str) {
        let mut inner = self.inner.write().expect("state lock poisoned");
        inner.values.remove(internal_key);
        inner.held.remove(internal_key);
    }

    pub fn is_held(&self, internal_key: &str) -> bool {
        self.inner.read().expect("state lock poisoned").held.contains(internal_key)
    }

    /// All currently-held internal keys, used by the dispatcher to
    /// synthesize releases on profile swap/shutdown (§4.9, §8).
    pub fn held_keys(&self) -> Vec<String> {
        self.inner.read().expect("state lock poisoned").held.iter().cloned().collect()
    }

    pub fn stats(&self) -> StateStats {
        let inner = self.inner.read().expect("state lock poisoned");
        let (mut user, mut internal) = (0, 0);
        for key in inner.values.keys() {
            if key.starts_with('*') {
                internal += 1;
            } else {
                user += 1;
            }
        }
        StateStats {
            total: inner.values.len(),
            user,
            internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateStats {
    pub total: usize,
    pub user: usize,
    pub internal: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_user_key_reads_zero() {
        let state = StateManager::new();
        assert_eq!(state.get("Foo"), 0);
    }

    #[test]
    fn set_then_get_round_trips() {
        let state = StateManager::new();
        state.set("Counter", 5).unwrap();
        assert_eq!(state.get("Counter"), 5);
    }

    #[test]
    fn increase_then_decrease_same_delta_is_identity() {
        let state = StateManager::new();
        state.set("Counter", 10).unwrap();
        state.increase("Counter", 3).unwrap();
        state.decrease("Counter", 3).unwrap();
        assert_eq!(state.get("Counter"), 10);
    }

    #[test]
    fn rejects_non_alphanumeric_user_key() {
        let state = StateManager::new();
        assert!(state.set("bad key!", 1).is_err());
    }

    #[test]
    fn rejects_unrecognized_internal_namespace() {
        let state = StateManager::new();
        assert!(state.set("*Bogus", 1).is_err());
    }

    #[test]
    fn accepts_recognized_internal_namespaces() {
        let state = StateManager::new();
        assert!(state.set("*Key65", 1).is_ok());
        assert!(state.set("*Btn0_A", 1).is_ok());
        assert!(state.set("*Alt12345", 1).is_ok());
    }

    #[test]
    fn held_key_down_then_up_clears_held_set() {
        let state = StateManager::new();
        state.record_held("*Key65").unwrap();
        assert!(state.is_held("*Key65"));
        state.release_held("*Key65");
        assert!(!state.is_held("*Key65"));
        assert!(state.held_keys().is_empty());
    }

    #[test]
    fn late_release_after_already_released_is_noop() {
        let state = StateManager::new();
        state.record_held("*Key65").unwrap();
        state.release_held("*Key65");
        state.release_held("*Key65");
        assert!(!state.is_held("*Key65"));
    }

    #[test]
    fn clear_all_empties_values_and_held() {
        let state = StateManager::new();
        state.set("Counter", 1).unwrap();
        state.record_held("*Key1").unwrap();
        state.clear_all();
        assert_eq!(state.get("Counter"), 0);
        assert!(state.held_keys().is_empty());
    }
}
