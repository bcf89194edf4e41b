//! Per-run simulation state threaded through every node entry point.

use crate::strategy::CachePolicy;
use crate::workload::FileCatalog;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_ccnsim_common::metrics::SimMetrics;
use rust_ccnsim_common::ndn::Name;
use rust_ccnsim_common::types::{NodeId, PacketId, DEFAULT_DATA_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Inclusive packet-id range whose hops are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementWindow {
    pub lower: u64,
    pub upper: u64,
}

impl MeasurementWindow {
    pub fn contains(&self, id: PacketId) -> bool {
        self.lower <= id.0 && id.0 <= self.upper
    }
}

impl Default for MeasurementWindow {
    fn default() -> Self {
        Self {
            lower: 0,
            upper: u64::MAX,
        }
    }
}

pub struct SimContext {
    next_packet_id: u64,
    prefixes: HashMap<NodeId, Name>,
    pub catalog: FileCatalog,
    pub rng: StdRng,
    pub metrics: SimMetrics,
    pub window: MeasurementWindow,
    pub cache_policy: CachePolicy,
    /// Nominal size of produced Data.
    pub data_size: usize,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            next_packet_id: 0,
            prefixes: HashMap::new(),
            catalog: FileCatalog::default(),
            rng: StdRng::seed_from_u64(seed),
            metrics: SimMetrics::new(),
            window: MeasurementWindow::default(),
            cache_policy: CachePolicy::default(),
            data_size: DEFAULT_DATA_SIZE,
        }
    }

    /// Ids start at 1 and never repeat within a run.
    pub fn next_packet_id(&mut self) -> PacketId {
        self.next_packet_id += 1;
        PacketId(self.next_packet_id)
    }

    pub fn packets_issued(&self) -> u64 {
        self.next_packet_id
    }

    pub fn in_window(&self, id: Option<PacketId>) -> bool {
        id.map_or(false, |id| self.window.contains(id))
    }

    pub fn set_producer_prefix(&mut self, producer: NodeId, prefix: Name) {
        self.prefixes.insert(producer, prefix);
    }

    pub fn producer_prefix(&self, producer: NodeId) -> Option<&Name> {
        self.prefixes.get(&producer)
    }

    /// Producer id and prefix pairs in id order.
    pub fn producer_prefixes(&self) -> Vec<(NodeId, Name)> {
        let mut pairs: Vec<_> = self.prefixes.iter().map(|(id, p)| (*id, p.clone())).collect();
        pairs.sort_by_key(|(id, _)| *id);
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_ids_are_unique() {
        let mut ctx = SimContext::new(0);
        let a = ctx.next_packet_id();
        let b = ctx.next_packet_id();
        assert_eq!(a, PacketId(1));
        assert_ne!(a, b);
        assert_eq!(ctx.packets_issued(), 2);
    }

    #[test]
    fn test_window() {
        let mut ctx = SimContext::new(0);
        ctx.window = MeasurementWindow { lower: 5, upper: 7 };
        assert!(!ctx.in_window(None));
        assert!(!ctx.in_window(Some(PacketId(4))));
        assert!(ctx.in_window(Some(PacketId(5))));
        assert!(ctx.in_window(Some(PacketId(7))));
        assert!(!ctx.in_window(Some(PacketId(8))));
    }

    #[test]
    fn test_runs_are_isolated() {
        let mut a = SimContext::new(1);
        let mut b = SimContext::new(1);
        a.next_packet_id();
        a.metrics.responses.increment();
        assert_eq!(b.next_packet_id(), PacketId(1));
        assert_eq!(b.metrics.responses.value(), 0);
    }
}
