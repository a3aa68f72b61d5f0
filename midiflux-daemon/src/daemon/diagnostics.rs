// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Dispatch-latency telemetry (§4.8 "Performance telemetry", §14), gated
//! behind the `diagnostics` Cargo feature. A fixed-capacity ring buffer of
//! recent per-event dispatch latencies, summarized on demand.

use std::sync::Mutex;
use std::time::Duration;

const RING_CAPACITY: usize = 1024;

pub struct LatencySampler {
    threshold: Duration,
    samples: Mutex<RingBuffer>,
}

struct RingBuffer {
    values_micros: Vec<u64>,
    next: usize,
    len: usize,
}

impl RingBuffer {
    fn new() -> Self {
        RingBuffer {
            values_micros: vec![0; RING_CAPACITY],
            next: 0,
            len: 0,
        }
    }

    fn push(&mut self, micros: u64) {
        self.values_micros[self.next] = micros;
        self.next = (self.next + 1) % RING_CAPACITY;
        self.len = (self.len + 1).min(RING_CAPACITY);
    }

    fn snapshot(&self) -> Vec<u64> {
        self.values_micros[..self.len].to_vec()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub avg_micros: f64,
    pub p95_micros: u64,
    pub max_micros: u64,
    pub over_threshold: usize,
}

impl LatencySampler {
    pub fn new(threshold: Duration) -> Self {
        LatencySampler {
            threshold,
            samples: Mutex::new(RingBuffer::new()),
        }
    }

    pub fn record(&self, latency: Duration) {
        let micros = latency.as_micros().min(u64::MAX as u128) as u64;
        self.samples.lock().expect("latency sampler lock poisoned").push(micros);
    }

    pub fn stats(&self) -> LatencyStats {
        let mut values = self.samples.lock().expect("latency sampler lock poisoned").snapshot();
        if values.is_empty() {
            return LatencyStats {
                count: 0,
                avg_micros: 0.0,
                p95_micros: 0,
                max_micros: 0,
                over_threshold: 0,
            };
        }
        values.sort_unstable();
        let count = values.len();
        let sum: u64 = values.iter().sum();
        let avg = sum as f64 / count as f64;
        let p95_index = ((count as f64) * 0.95).ceil() as usize;
        let p95 = values[p95_index.saturating_sub(1).min(count - 1)];
        let max = *values.last().unwrap();
        let threshold_micros = self.threshold.as_micros() as u64;
        let over_threshold = values.iter().filter(|&&v| v > threshold_micros).count();

        LatencyStats {
            count,
            avg_micros: avg,
            p95_micros: p95,
            max_micros: max,
            over_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sampler_reports_zeroed_stats() {
        let sampler = LatencySampler::new(Duration::from_millis(5));
        let stats = sampler.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.max_micros, 0);
    }

    #[test]
    fn records_and_summarizes_latencies() {
        let sampler = LatencySampler::new(Duration::from_micros(500));
        for micros in [100u64, 200, 300, 400, 1000] {
            sampler.record(Duration::from_micros(micros));
        }
        let stats = sampler.stats();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.max_micros, 1000);
        assert_eq!(stats.over_threshold, 1);
    }

    #[test]
    fn ring_buffer_wraps_at_capacity() {
        let sampler = LatencySampler::new(Duration::from_secs(1));
        for i in 0..(RING_CAPACITY + 10) {
            sampler.record(Duration::from_micros(i as u64));
        }
        assert_eq!(sampler.stats().count, RING_CAPACITY);
    }
}
