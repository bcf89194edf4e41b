//! Metrics collection for simulation runs.
//!
//! This module provides the counters and histograms a run accumulates while
//! messages move through the network, and the aggregate that reports them.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/* ---------------------------------------------------------------- *
 * Simple Counter
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        let c = Counter::new();
        c.value.store(self.value(), Ordering::Relaxed);
        c
    }
}

/* ---------------------------------------------------------------- *
 * Gauge
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn decrement(&self) {
        let _ = self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Gauge {
    fn clone(&self) -> Self {
        let g = Gauge::new();
        g.value.store(self.value(), Ordering::Relaxed);
        g
    }
}

/* ---------------------------------------------------------------- *
 * Histogram
 * ---------------------------------------------------------------- */

#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<u64>,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Bucket `i` counts observations `<= boundaries[i]` not counted by an earlier bucket.
    pub fn new(boundaries: Vec<u64>) -> Self {
        let buckets = (0..boundaries.len()).map(|_| AtomicU64::new(0)).collect();

        Self {
            buckets,
            boundaries,
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// `0, 1, 2, 4, ...` up to `max`.
    pub fn powers_of_two(max: u64) -> Self {
        let mut boundaries = vec![0];
        let mut value = 1;
        while value <= max {
            boundaries.push(value);
            value *= 2;
        }
        Self::new(boundaries)
    }

    pub fn observe(&self, value: u64) {
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        match self.boundaries.iter().position(|&b| value <= b) {
            Some(idx) => {
                self.buckets[idx].fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.overflow.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn average(&self) -> f64 {
        let c = self.count();
        if c == 0 {
            0.0
        } else {
            self.sum() as f64 / c as f64
        }
    }

    pub fn counts(&self) -> Vec<(u64, u64)> {
        self.boundaries
            .iter()
            .zip(self.buckets.iter())
            .map(|(&b, bucket)| (b, bucket.load(Ordering::Relaxed)))
            .collect()
    }

    pub fn overflow(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed)
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }
}

impl Clone for Histogram {
    fn clone(&self) -> Self {
        Self {
            buckets: self
                .buckets
                .iter()
                .map(|b| AtomicU64::new(b.load(Ordering::Relaxed)))
                .collect(),
            boundaries: self.boundaries.clone(),
            overflow: AtomicU64::new(self.overflow()),
            sum: AtomicU64::new(self.sum()),
            count: AtomicU64::new(self.count()),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Aggregate metrics for a simulation run
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub struct SimMetrics {
    // Interest path
    pub interests_received: Counter,
    pub interests_forwarded: Counter,
    pub interests_aggregated: Counter,
    pub interests_retried: Counter,
    pub loop_resolutions: Counter,
    pub nacks_sent: Counter,

    // Data path
    pub data_received: Counter,
    pub data_forwarded: Counter,
    pub responses: Counter,

    // Cache
    pub cs_hits: Counter,
    pub cs_misses: Counter,
    pub cs_inserts: Counter,
    pub cs_evictions: Counter,
    pub cached_objects: Gauge,

    // Dynamic FIB
    pub dfib_installs: Counter,
    pub dfib_remote_erasures: Counter,

    // Path stretch
    pub measured_hops: Counter,
    pub required_hops: Counter,
    /// Reuse counter of every object leaving a content store.
    pub reuse: Histogram,
    /// Response hop count over the origin round trip, in percent.
    pub stretch_percent: Histogram,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measured over required hop ratio, or 0 before any request was measured.
    pub fn hop_ratio(&self) -> f64 {
        let required = self.required_hops.value();
        if required == 0 {
            0.0
        } else {
            self.measured_hops.value() as f64 / required as f64
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            interests_received: self.interests_received.value(),
            interests_forwarded: self.interests_forwarded.value(),
            interests_aggregated: self.interests_aggregated.value(),
            interests_retried: self.interests_retried.value(),
            loop_resolutions: self.loop_resolutions.value(),
            nacks_sent: self.nacks_sent.value(),
            data_received: self.data_received.value(),
            data_forwarded: self.data_forwarded.value(),
            responses: self.responses.value(),
            cs_hits: self.cs_hits.value(),
            cs_misses: self.cs_misses.value(),
            cs_inserts: self.cs_inserts.value(),
            cs_evictions: self.cs_evictions.value(),
            cached_objects: self.cached_objects.value(),
            dfib_installs: self.dfib_installs.value(),
            dfib_remote_erasures: self.dfib_remote_erasures.value(),
            measured_hops: self.measured_hops.value(),
            required_hops: self.required_hops.value(),
            hop_ratio: self.hop_ratio(),
            average_reuse: self.reuse.average(),
            reuse_histogram: self.reuse.counts(),
            average_stretch_percent: self.stretch_percent.average(),
        }
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self {
            interests_received: Counter::new(),
            interests_forwarded: Counter::new(),
            interests_aggregated: Counter::new(),
            interests_retried: Counter::new(),
            loop_resolutions: Counter::new(),
            nacks_sent: Counter::new(),
            data_received: Counter::new(),
            data_forwarded: Counter::new(),
            responses: Counter::new(),
            cs_hits: Counter::new(),
            cs_misses: Counter::new(),
            cs_inserts: Counter::new(),
            cs_evictions: Counter::new(),
            cached_objects: Gauge::new(),
            dfib_installs: Counter::new(),
            dfib_remote_erasures: Counter::new(),
            measured_hops: Counter::new(),
            required_hops: Counter::new(),
            reuse: Histogram::powers_of_two(1 << 16),
            stretch_percent: Histogram::new(vec![25, 50, 75, 100, 125, 150, 200, 300]),
        }
    }
}

/// Plain copy of [`SimMetrics`] for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub interests_received: u64,
    pub interests_forwarded: u64,
    pub interests_aggregated: u64,
    pub interests_retried: u64,
    pub loop_resolutions: u64,
    pub nacks_sent: u64,
    pub data_received: u64,
    pub data_forwarded: u64,
    pub responses: u64,
    pub cs_hits: u64,
    pub cs_misses: u64,
    pub cs_inserts: u64,
    pub cs_evictions: u64,
    pub cached_objects: u64,
    pub dfib_installs: u64,
    pub dfib_remote_erasures: u64,
    pub measured_hops: u64,
    pub required_hops: u64,
    pub hop_ratio: f64,
    pub average_reuse: f64,
    pub reuse_histogram: Vec<(u64, u64)>,
    pub average_stretch_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let c = Counter::new();
        c.increment();
        c.add(4);
        assert_eq!(c.value(), 5);
        c.reset();
        assert_eq!(c.value(), 0);
    }

    #[test]
    fn test_gauge_saturates() {
        let g = Gauge::new();
        g.increment();
        g.decrement();
        g.decrement();
        assert_eq!(g.value(), 0);
    }

    #[test]
    fn test_histogram_buckets() {
        let h = Histogram::powers_of_two(8);
        for v in [0, 1, 3, 3, 8, 20] {
            h.observe(v);
        }
        let counts = h.counts();
        assert_eq!(counts[0], (0, 1));
        assert_eq!(counts[1], (1, 1));
        assert_eq!(counts[3], (4, 2));
        assert_eq!(counts[4], (8, 1));
        assert_eq!(h.overflow(), 1);
        assert_eq!(h.count(), 6);
        assert_eq!(h.sum(), 35);
    }

    #[test]
    fn test_hop_ratio() {
        let m = SimMetrics::new();
        assert_eq!(m.hop_ratio(), 0.0);
        m.measured_hops.add(3);
        m.required_hops.add(4);
        assert!((m.hop_ratio() - 0.75).abs() < 1e-9);
        assert_eq!(m.snapshot().measured_hops, 3);
    }
}
