// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Property tests for the two pieces of §4 with a quantified invariant: the
//! relative-CC decoder's delta/magnitude relationship (§4.7) and the
//! registry's tier-priority ordering (§4.3).

use midiflux_core::midi::{Channel, InputType};
use midiflux_core::model::{ActionMapping, DeviceConfig, DeviceSelector, MidiInput, Profile};
use midiflux_core::registry::Registry;
use midiflux_core::relative_cc::decode;
use proptest::prelude::*;
use std::collections::HashMap;

fn dummy_action(tag: &str) -> midiflux_core::action::Action {
    midiflux_core::action::Action::new_key_press_release(tag, midiflux_core::action::KeyCode::Space)
}

fn profile_with_one_mapping_per_tier(number: u8) -> Profile {
    let mapping_for = |device: DeviceSelector, channel: Channel, tag: &str| ActionMapping {
        id: None,
        description: Some(tag.to_string()),
        enabled: true,
        input: MidiInput {
            device: DeviceSelector::Any,
            channel,
            input_type: InputType::NoteOn,
            input_number: Some(number),
        },
        action: dummy_action(tag),
    };

    Profile {
        name: "tiers".into(),
        description: None,
        initial_states: HashMap::new(),
        devices: vec![
            DeviceConfig {
                device_name: DeviceSelector::Exact("Launchpad".into()),
                mappings: vec![mapping_for(
                    DeviceSelector::Exact("Launchpad".into()),
                    Channel::Exact(1),
                    "exact-exact",
                )],
            },
            DeviceConfig {
                device_name: DeviceSelector::Exact("Launchpad".into()),
                mappings: vec![mapping_for(
                    DeviceSelector::Exact("Launchpad".into()),
                    Channel::Any,
                    "exact-any",
                )],
            },
            DeviceConfig {
                device_name: DeviceSelector::Any,
                mappings: vec![mapping_for(DeviceSelector::Any, Channel::Exact(1), "any-exact")],
            },
            DeviceConfig {
                device_name: DeviceSelector::Any,
                mappings: vec![mapping_for(DeviceSelector::Any, Channel::Any, "any-any")],
            },
        ],
    }
}

proptest! {
    /// `decode` never returns a magnitude larger than 63, and the sign always
    /// matches the half of the wire range the value fell into (§4.7).
    #[test]
    fn decode_magnitude_and_sign_are_bounded(wire in 0u8..=127u8) {
        let delta = decode(wire);
        prop_assert!(delta.abs() <= 63);
        match wire {
            64 => prop_assert_eq!(delta, 0),
            1..=63 => prop_assert!(delta > 0),
            65..=127 => prop_assert!(delta < 0),
            0 => prop_assert_eq!(delta, 0),
            _ => unreachable!(),
        }
    }

    /// Summing `decode` over an arbitrary run of wire values never produces a
    /// magnitude larger than the sum of the individual magnitudes (no
    /// cancellation-induced overflow/surprises from the decode step itself).
    #[test]
    fn decode_sum_never_exceeds_sum_of_magnitudes(values in prop::collection::vec(0u8..=127u8, 0..64)) {
        let deltas: Vec<i32> = values.iter().map(|v| decode(*v)).collect();
        let sum: i32 = deltas.iter().sum();
        let sum_of_magnitudes: i32 = deltas.iter().map(|d| d.abs()).sum();
        prop_assert!(sum.abs() <= sum_of_magnitudes);
    }

    /// Whichever of the four tiers actually has a mapping for a given
    /// (device, channel, type, number), the registry picks the most specific
    /// one available, regardless of which concrete device/channel pair was
    /// queried (§4.3's exact-over-wildcard priority).
    #[test]
    fn registry_always_prefers_the_most_specific_available_tier(
        number in 0u8..=127u8,
        query_channel in 1u8..=16u8,
    ) {
        let profile = profile_with_one_mapping_per_tier(number);
        let registry = Registry::build(&profile);

        // Querying the exact device on the exact channel hits the most
        // specific tier no matter which channel the other tiers also cover.
        let hits = registry.lookup("Launchpad", Channel::Exact(1), InputType::NoteOn, Some(number));
        prop_assert_eq!(hits.len(), 1);
        prop_assert_eq!(hits[0].description.as_deref(), Some("exact-exact"));

        // The exact device on a different channel falls through to its own
        // any-channel tier before ever considering any-device tiers.
        if query_channel != 1 {
            let hits = registry.lookup("Launchpad", Channel::Exact(query_channel), InputType::NoteOn, Some(number));
            prop_assert_eq!(hits.len(), 1);
            prop_assert_eq!(hits[0].description.as_deref(), Some("exact-any"));
        }

        // An unknown device on channel 1 hits the any-device/exact-channel
        // tier ahead of the any/any catch-all.
        let hits = registry.lookup("Unknown", Channel::Exact(1), InputType::NoteOn, Some(number));
        prop_assert_eq!(hits.len(), 1);
        prop_assert_eq!(hits[0].description.as_deref(), Some("any-exact"));

        // An unknown device on any other channel only ever reaches the
        // any/any catch-all.
        if query_channel != 1 {
            let hits = registry.lookup("Unknown", Channel::Exact(query_channel), InputType::NoteOn, Some(number));
            prop_assert_eq!(hits.len(), 1);
            prop_assert_eq!(hits[0].description.as_deref(), Some("any-any"));
        }
    }
}
