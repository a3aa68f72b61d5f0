// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Mapping registry (C3): four-tier device x channel lookup, rebuilt and
//! published as an atomic snapshot on every profile load.

use crate::midi::{Channel, InputType};
use crate::model::{ActionMapping, DeviceSelector, Profile};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bucket key within a single device/channel tier: (inputType, inputNumber).
/// `inputNumber` is `None` for kinds that carry no number (PitchBend,
/// ChannelPressure, SysEx).
type BucketKey = (InputType, Option<u8>);

/// Per-(device,channel) indexed registry (§4.3). Each tier is keyed by the
/// concrete device name / channel so lookup is a direct hash lookup rather
/// than a scan.
#[derive(Default)]
pub struct Registry {
    exact_device_exact_channel: HashMap<(String, u8), HashMap<BucketKey, Vec<Arc<ActionMapping>>>>,
    exact_device_any_channel: HashMap<String, HashMap<BucketKey, Vec<Arc<ActionMapping>>>>,
    any_device_exact_channel: HashMap<u8, HashMap<BucketKey, Vec<Arc<ActionMapping>>>>,
    any_device_any_channel: HashMap<BucketKey, Vec<Arc<ActionMapping>>>,
    total_mappings: usize,
    enabled_mappings: usize,
    devices: std::collections::HashSet<String>,
    channels: std::collections::HashSet<u8>,
}

impl Registry {
    pub fn build(profile: &Profile) -> Registry {
        let mut registry = Registry::default();
        for (device_selector, mapping) in profile.all_mappings() {
            registry.total_mappings += 1;
            if !mapping.enabled {
                continue;
            }
            registry.enabled_mappings += 1;

            if let DeviceSelector::Exact(name) = device_selector {
                registry.devices.insert(name.clone());
            }
            if let Channel::Exact(ch) = mapping.input.channel {
                registry.channels.insert(ch);
            }

            let key: BucketKey = (mapping.input.input_type, mapping.input.input_number);
            let arc = Arc::new(mapping.clone());

            match (device_selector, mapping.input.channel) {
                (DeviceSelector::Exact(name), Channel::Exact(ch)) => {
                    registry
                        .exact_device_exact_channel
                        .entry((name.clone(), ch))
                        .or_default()
                        .entry(key)
                        .or_default()
                        .push(arc);
                }
                (DeviceSelector::Exact(name), Channel::Any) => {
                    registry
                        .exact_device_any_channel
                        .entry(name.clone())
                        .or_default()
                        .entry(key)
                        .or_default()
                        .push(arc);
                }
                (DeviceSelector::Any, Channel::Exact(ch)) => {
                    registry
                        .any_device_exact_channel
                        .entry(ch)
                        .or_default()
                        .entry(key)
                        .or_default()
                        .push(arc);
                }
                (DeviceSelector::Any, Channel::Any) => {
                    registry
                        .any_device_any_channel
                        .entry(key)
                        .or_default()
                        .push(arc);
                }
            }
        }
        registry
    }

    /// Four-tier lookup for a concrete `(inputType, inputNumber)`. SysEx
    /// (channel-less) only ever reaches this with `channel = Any`, so it
    /// naturally only ever hits the two any-channel tiers.
    pub fn lookup(
        &self,
        device_name: &str,
        channel: Channel,
        input_type: InputType,
        input_number: Option<u8>,
    ) -> &[Arc<ActionMapping>] {
        let key: BucketKey = (input_type, input_number);

        if let Channel::Exact(ch) = channel {
            if let Some(hits) = self
                .exact_device_exact_channel
                .get(&(device_name.to_string(), ch))
                .and_then(|b| b.get(&key))
            {
                if !hits.is_empty() {
                    return hits;
                }
            }
        }

        if let Some(hits) = self
            .exact_device_any_channel
            .get(device_name)
            .and_then(|b| b.get(&key))
        {
            if !hits.is_empty() {
                return hits;
            }
        }

        if let Channel::Exact(ch) = channel {
            if let Some(hits) = self.any_device_exact_channel.get(&ch).and_then(|b| b.get(&key)) {
                if !hits.is_empty() {
                    return hits;
                }
            }
        }

        if let Some(hits) = self.any_device_any_channel.get(&key) {
            if !hits.is_empty() {
                return hits;
            }
        }

        &[]
    }

    /// CC lookup tries the Absolute bucket, then the Relative bucket, since
    /// the wire bytes of a Control Change carry no indication of which the
    /// profile author intended (§4.2); whichever is registered for this
    /// (device, channel, number) determines the dispatch path.
    pub fn lookup_control_change(
        &self,
        device_name: &str,
        channel: Channel,
        controller: u8,
    ) -> (InputType, &[Arc<ActionMapping>]) {
        let abs = self.lookup(
            device_name,
            channel,
            InputType::ControlChangeAbsolute,
            Some(controller),
        );
        if !abs.is_empty() {
            return (InputType::ControlChangeAbsolute, abs);
        }
        let rel = self.lookup(
            device_name,
            channel,
            InputType::ControlChangeRelative,
            Some(controller),
        );
        (InputType::ControlChangeRelative, rel)
    }

    pub fn total_mappings(&self) -> usize {
        self.total_mappings
    }

    pub fn enabled_mappings(&self) -> usize {
        self.enabled_mappings
    }

    pub fn unique_devices(&self) -> usize {
        self.devices.len()
    }

    pub fn unique_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.exact_device_exact_channel.values().map(|b| b.len()).sum::<usize>()
            + self.exact_device_any_channel.values().map(|b| b.len()).sum::<usize>()
            + self.any_device_exact_channel.values().map(|b| b.len()).sum::<usize>()
            + self.any_device_any_channel.len()
    }
}

/// Generation counter for published registries, exposed for diagnostics and
/// tests confirming a swap actually took effect.
pub static REGISTRY_GENERATION: AtomicUsize = AtomicUsize::new(0);

/// Atomically-swappable holder for the active registry. One writer (the
/// profile controller, on the dispatch thread), many readers.
pub struct RegistryHandle {
    inner: arc_swap_lite::ArcSwap<Registry>,
}

/// Minimal swap cell: an `Arc<Registry>` behind a `RwLock`, sufficient
/// because publication is rare and every read only ever clones the `Arc`
/// under a brief read-lock.
mod arc_swap_lite {
    use std::sync::{Arc, RwLock};

    pub struct ArcSwap<T> {
        inner: RwLock<Arc<T>>,
    }

    impl<T: Default> Default for ArcSwap<T> {
        fn default() -> Self {
            ArcSwap {
                inner: RwLock::new(Arc::new(T::default())),
            }
        }
    }

    impl<T> ArcSwap<T> {
        pub fn new(value: Arc<T>) -> Self {
            ArcSwap {
                inner: RwLock::new(value),
            }
        }

        pub fn load(&self) -> Arc<T> {
            self.inner.read().expect("registry lock poisoned").clone()
        }

        pub fn store(&self, value: Arc<T>) {
            *self.inner.write().expect("registry lock poisoned") = value;
        }
    }
}

impl Default for RegistryHandle {
    fn default() -> Self {
        RegistryHandle {
            inner: arc_swap_lite::ArcSwap::default(),
        }
    }
}

impl RegistryHandle {
    pub fn load(&self) -> Arc<Registry> {
        self.inner.load()
    }

    /// Publish a freshly built registry, replacing the previous one. Readers
    /// holding an `Arc` from a prior `load()` keep seeing the old, complete
    /// snapshot until they re-`load()`; this is what makes publication
    /// atomic from a dispatch's point of view (§3 invariants).
    pub fn publish(&self, registry: Registry) {
        self.inner.store(Arc::new(registry));
        REGISTRY_GENERATION.fetch_add(1, Ordering::SeqCst);
    }
}
