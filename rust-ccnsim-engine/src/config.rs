//! Run configuration.
//!
//! Every struct deserializes with `#[serde(default)]`, so an experiment file
//! only needs the fields it changes.

use crate::context::MeasurementWindow;
use crate::strategy::{CachePolicy, Strategy};
use crate::topology::Topology;
use rust_ccnsim_common::ndn::Name;
use rust_ccnsim_common::types::{
    NodeId, DEFAULT_CACHE_THRESHOLD, DEFAULT_CHUNKS_PER_FILE, DEFAULT_DATA_SIZE,
    DEFAULT_GOLDEN_RATIO, FIB_FACE_LIFETIME,
};
use rust_ccnsim_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default probability a static-only router caches a passing Data.
pub const DEFAULT_CACHE_PROBABILITY: f64 = 0.5;

/// Network shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologyConfig {
    /// Complete k-ary tree; the root produces, the leaves request.
    KaryTree {
        k: usize,
        height: u32,
        prefix: String,
    },
    /// k-ary router tree with `users_per_leaf` users on every leaf router.
    HeavyEdge {
        k: usize,
        height: u32,
        users_per_leaf: usize,
        prefix: String,
    },
    /// Hand-written graph.
    Explicit {
        nodes: usize,
        links: Vec<(u32, u32)>,
        producers: Vec<ProducerConfig>,
        users: Vec<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub node: u32,
    pub prefix: String,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        TopologyConfig::KaryTree {
            k: 2,
            height: 4,
            prefix: "p".to_string(),
        }
    }
}

impl TopologyConfig {
    pub fn build(&self) -> Result<Topology> {
        match self {
            TopologyConfig::KaryTree { k, height, prefix } => {
                Topology::kary_tree(*k, *height, &Name::parse(prefix)?)
            }
            TopologyConfig::HeavyEdge {
                k,
                height,
                users_per_leaf,
                prefix,
            } => Topology::heavy_edge(*k, *height, *users_per_leaf, &Name::parse(prefix)?),
            TopologyConfig::Explicit {
                nodes,
                links,
                producers,
                users,
            } => {
                let links: Vec<_> = links.iter().map(|&(a, b)| (NodeId(a), NodeId(b))).collect();
                let producers = producers
                    .iter()
                    .map(|p| Ok((NodeId(p.node), Name::parse(&p.prefix)?)))
                    .collect::<Result<Vec<_>>>()?;
                let users: Vec<_> = users.iter().copied().map(NodeId).collect();
                Topology::explicit(*nodes, &links, &producers, &users)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    DoMyBest,
    StaticOnly,
}

/// Forwarding strategy and its tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Static-only: chance a router caches a passing Data.
    pub cache_probability: f64,
    /// Minimum distance gap before a cache hit is re-cached downstream.
    pub cache_threshold: i32,
    /// Upper bound on caching/current distance for re-caching a hit.
    pub golden_ratio: f64,
    /// Lifetime given to a dynamic FIB face on every update.
    pub fib_face_lifetime: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            kind: StrategyKind::DoMyBest,
            cache_probability: DEFAULT_CACHE_PROBABILITY,
            cache_threshold: DEFAULT_CACHE_THRESHOLD,
            golden_ratio: DEFAULT_GOLDEN_RATIO,
            fib_face_lifetime: FIB_FACE_LIFETIME,
        }
    }
}

impl StrategyConfig {
    pub fn strategy(&self) -> Strategy {
        match self.kind {
            StrategyKind::DoMyBest => Strategy::DoMyBest,
            StrategyKind::StaticOnly => Strategy::StaticOnly {
                cache_probability: self.cache_probability,
            },
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            cache_threshold: self.cache_threshold,
            golden_ratio: self.golden_ratio,
        }
    }
}

/// Request workload and cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub files_per_prefix: usize,
    pub chunks_per_file: u32,
    /// Zipf exponent of file popularity.
    pub zipf_alpha: f64,
    /// Nominal size of every produced Data, in bytes.
    pub data_size: usize,
    /// Per-router content store capacity in bytes; derived from
    /// `capacity_factor` when unset.
    pub capacity: Option<i64>,
    /// Share of the whole catalog that fits in all routers together.
    pub capacity_factor: f64,
    /// Upper bound of request cycles a user runs per round.
    pub user_burst_max: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            files_per_prefix: 50,
            chunks_per_file: DEFAULT_CHUNKS_PER_FILE,
            zipf_alpha: 0.75,
            data_size: DEFAULT_DATA_SIZE,
            capacity: None,
            capacity_factor: 0.05,
            user_burst_max: 1,
        }
    }
}

impl WorkloadConfig {
    /// Content store size per router for a network with `prefixes` producers.
    pub fn router_capacity(&self, prefixes: usize, routers: usize) -> i64 {
        if let Some(capacity) = self.capacity {
            return capacity;
        }
        if routers == 0 {
            return 0;
        }
        let catalog_bytes = (prefixes * self.files_per_prefix) as f64
            * self.chunks_per_file as f64
            * self.data_size as f64;
        (catalog_bytes * self.capacity_factor / routers as f64) as i64
    }
}

/// Periodic dynamic FIB aging; disabled when `every_rounds` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FibTickConfig {
    pub every_rounds: u64,
    pub deviation: u32,
}

impl Default for FibTickConfig {
    fn default() -> Self {
        Self {
            every_rounds: 0,
            deviation: 1,
        }
    }
}

/// One simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub name: String,
    pub seed: u64,
    pub topology: TopologyConfig,
    pub strategy: StrategyConfig,
    pub workload: WorkloadConfig,
    pub window: MeasurementWindow,
    pub fib_tick: FibTickConfig,
    /// Stop once users have received this many responses.
    pub response_target: u64,
    /// Hard stop, in scheduler rounds.
    pub max_rounds: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            seed: 1,
            topology: TopologyConfig::default(),
            strategy: StrategyConfig::default(),
            workload: WorkloadConfig::default(),
            window: MeasurementWindow::default(),
            fib_tick: FibTickConfig::default(),
            response_target: 10_000,
            max_rounds: Some(100_000),
        }
    }
}

impl SimConfig {
    /// Range checks that the topology builders do not cover.
    pub fn validate(&self) -> Result<()> {
        let s = &self.strategy;
        if !(0.0..=1.0).contains(&s.cache_probability) {
            return Err(Error::Config(format!(
                "cache_probability must be within [0, 1], got {}",
                s.cache_probability
            )));
        }
        if !(s.golden_ratio > 0.0) {
            return Err(Error::Config(format!(
                "golden_ratio must be positive, got {}",
                s.golden_ratio
            )));
        }

        let w = &self.workload;
        if w.files_per_prefix == 0 || w.chunks_per_file == 0 {
            return Err(Error::Config("workload needs at least one file and one chunk".into()));
        }
        if !(w.zipf_alpha >= 0.0) {
            return Err(Error::Config(format!("zipf_alpha must be non-negative, got {}", w.zipf_alpha)));
        }
        if !(w.capacity_factor >= 0.0) || w.capacity.map_or(false, |c| c < 0) {
            return Err(Error::Config("content store capacity must be non-negative".into()));
        }
        if w.user_burst_max == 0 {
            return Err(Error::Config("user_burst_max must be at least 1".into()));
        }

        if self.window.lower > self.window.upper {
            return Err(Error::Config(format!(
                "measurement window {}..={} is empty",
                self.window.lower, self.window.upper
            )));
        }
        if self.response_target == 0 {
            return Err(Error::Config("response_target must be at least 1".into()));
        }
        Ok(())
    }
}

/// A file of experiments, each run independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSet {
    pub experiments: Vec<SimConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy.strategy(), Strategy::DoMyBest);
        assert_eq!(config.strategy.cache_policy(), CachePolicy::default());
        assert_eq!(config.strategy.fib_face_lifetime, 10);
        assert_eq!(config.workload.data_size, 1024);
    }

    #[test]
    fn test_partial_json() {
        let config: SimConfig = serde_json::from_str(
            r#"{
                "seed": 9,
                "strategy": { "kind": "static_only", "cache_probability": 0.25 },
                "topology": { "kind": "heavy_edge", "k": 3, "height": 2, "users_per_leaf": 2, "prefix": "q" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.strategy.strategy(), Strategy::StaticOnly { cache_probability: 0.25 });
        assert_eq!(config.strategy.golden_ratio, 0.618);
        assert_eq!(config.response_target, 10_000);
        let topology = config.topology.build().unwrap();
        assert_eq!(topology.node_count(), 1 + 3 + 6);
    }

    #[test]
    fn test_explicit_topology() {
        let config: TopologyConfig = serde_json::from_str(
            r#"{
                "kind": "explicit",
                "nodes": 3,
                "links": [[0, 1], [1, 2]],
                "producers": [{ "node": 0, "prefix": "p" }],
                "users": [2]
            }"#,
        )
        .unwrap();
        let topology = config.build().unwrap();
        assert_eq!(topology.links().len(), 2);
    }

    #[test]
    fn test_experiment_set() {
        let set: ExperimentSet = serde_json::from_str(
            r#"{ "experiments": [ { "name": "a" }, { "name": "b", "response_target": 5 } ] }"#,
        )
        .unwrap();
        assert_eq!(set.experiments.len(), 2);
        assert_eq!(set.experiments[1].response_target, 5);
        assert_eq!(set.experiments[0].topology, TopologyConfig::default());
    }

    #[test]
    fn test_validation() {
        let mut config = SimConfig::default();
        config.strategy.cache_probability = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = SimConfig::default();
        config.workload.user_burst_max = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.window = MeasurementWindow { lower: 5, upper: 1 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_router_capacity() {
        let workload = WorkloadConfig {
            files_per_prefix: 10,
            chunks_per_file: 10,
            data_size: 100,
            capacity_factor: 0.5,
            ..Default::default()
        };
        assert_eq!(workload.router_capacity(1, 5), 1000);
        assert_eq!(workload.router_capacity(1, 0), 0);

        let fixed = WorkloadConfig {
            capacity: Some(77),
            ..Default::default()
        };
        assert_eq!(fixed.router_capacity(3, 3), 77);
    }
}
