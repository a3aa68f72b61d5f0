// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Relative CC decoder (C7): sign-magnitude decode of a 7-bit wire value.
//!
//! Only sign-magnitude is supported; two's-complement and binary-offset
//! encodings are explicitly out of scope (§9 Design Notes).

/// Decode a wire Control Change value (0..=127) into a signed delta.
///
/// - `64` -> `0` (ignored).
/// - `1..=63` -> positive delta equal to the value.
/// - `65..=127` -> negative delta, magnitude `v - 64`.
pub fn decode(wire_value: u8) -> i32 {
    match wire_value {
        64 => 0,
        v @ 1..=63 => v as i32,
        v @ 65..=127 => -((v as i32) - 64),
        // 0 carries no sign-magnitude meaning under this scheme; treat as
        // no-op rather than guessing a direction.
        _ => 0,
    }
}
