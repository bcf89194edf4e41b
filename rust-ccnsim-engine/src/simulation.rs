//! Round-based scheduler driving one simulated network.

use crate::config::SimConfig;
use crate::context::SimContext;
use crate::cs::ContentStoreStat;
use crate::network::Network;
use crate::node::{NodeCounters, NodeOptions};
use crate::topology::Topology;
use crate::workload::FileCatalog;
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use rust_ccnsim_common::metrics::MetricsSnapshot;
use rust_ccnsim_common::types::NodeRole;
use rust_ccnsim_common::{Error, Result};
use serde::Serialize;

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub name: String,
    pub strategy: String,
    pub seed: u64,
    pub nodes: usize,
    pub users: usize,
    pub rounds: u64,
    pub packets_issued: u64,
    pub router_capacity: i64,
    pub metrics: MetricsSnapshot,
    pub routers: Vec<RouterReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouterReport {
    pub id: u32,
    pub weight: f64,
    pub content_store: ContentStoreStat,
    pub pit_size: usize,
    pub static_fib_size: usize,
    pub dynamic_fib_size: usize,
    pub counters: NodeCounters,
}

pub struct Simulation {
    config: SimConfig,
    topology: Topology,
    network: Network,
    ctx: SimContext,
    router_capacity: i64,
    rounds: u64,
    finished: bool,
}

impl Simulation {
    /// Builds the topology, registers every node and generates the catalog.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let topology = config.topology.build()?;
        if topology.nodes_with_role(NodeRole::User).is_empty() {
            return Err(Error::Topology("no users to drive requests".into()));
        }
        if topology.prefixes().is_empty() {
            return Err(Error::Topology("no producers".into()));
        }

        let routers = topology.nodes_with_role(NodeRole::Router).len();
        let router_capacity = config
            .workload
            .router_capacity(topology.prefixes().len(), routers);

        let mut ctx = SimContext::new(config.seed);
        ctx.window = config.window;
        ctx.cache_policy = config.strategy.cache_policy();
        ctx.data_size = config.workload.data_size;

        let options = NodeOptions {
            strategy: config.strategy.strategy(),
            capacity: router_capacity,
            fib_face_lifetime: config.strategy.fib_face_lifetime,
            chunks_per_file: config.workload.chunks_per_file,
        };
        let network = Network::build(&topology, options, &mut ctx)?;

        let prefixes: Vec<_> = topology.prefixes().values().cloned().collect();
        ctx.catalog = FileCatalog::generate(
            &prefixes,
            config.workload.files_per_prefix,
            config.workload.chunks_per_file,
            config.workload.zipf_alpha,
            &mut ctx.rng,
        );

        info!(
            "Experiment '{}': {} nodes, {} routers with {} bytes each, strategy {}",
            config.name,
            topology.node_count(),
            routers,
            router_capacity,
            options.strategy
        );

        Ok(Self {
            config,
            topology,
            network,
            ctx,
            router_capacity,
            rounds: 0,
            finished: false,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// One round: every node gets a turn in shuffled order.
    pub fn step(&mut self) -> Result<()> {
        let mut order = self.network.ids();
        order.shuffle(&mut self.ctx.rng);
        let burst = self.config.workload.user_burst_max.max(1);

        for id in order {
            let ops = match self.network.node(id)?.role() {
                NodeRole::User => self.ctx.rng.gen_range(1..=burst),
                _ => 1,
            };
            self.network.step(id, ops, &mut self.ctx)?;
        }
        self.rounds += 1;

        let tick = self.config.fib_tick;
        if tick.every_rounds > 0 && self.rounds % tick.every_rounds == 0 {
            debug!("Round {}: aging dynamic FIBs by {}", self.rounds, tick.deviation);
            self.network.tick_dynamic_fibs(tick.deviation);
        }
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.ctx.metrics.responses.value() >= self.config.response_target
            || self.config.max_rounds.map_or(false, |max| self.rounds >= max)
    }

    /// Steps until the response target or the round limit is reached.
    pub fn run(&mut self) -> Result<SimReport> {
        while !self.is_done() {
            self.step()?;
        }
        self.finish();

        let report = self.report();
        info!(
            "Experiment '{}' finished after {} rounds: {} responses, hop ratio {:.3}, {} cache hits",
            report.name,
            report.rounds,
            report.metrics.responses,
            report.metrics.hop_ratio,
            report.metrics.cs_hits
        );
        Ok(report)
    }

    /// Folds still-resident objects into the reuse histogram, once.
    pub fn finish(&mut self) {
        if !self.finished {
            self.network.record_resident_reuse(&self.ctx);
            self.finished = true;
        }
    }

    pub fn report(&self) -> SimReport {
        let routers = self
            .network
            .nodes()
            .filter(|n| n.role() == NodeRole::Router)
            .map(|n| RouterReport {
                id: n.id().0,
                weight: n.weight(),
                content_store: n.content_store_stat(),
                pit_size: n.pit_size(),
                static_fib_size: n.static_fib_size(),
                dynamic_fib_size: n.dynamic_fib_size(),
                counters: n.counters().clone(),
            })
            .collect();

        SimReport {
            name: self.config.name.clone(),
            strategy: self.config.strategy.strategy().to_string(),
            seed: self.config.seed,
            nodes: self.network.len(),
            users: self.topology.nodes_with_role(NodeRole::User).len(),
            rounds: self.rounds,
            packets_issued: self.ctx.packets_issued(),
            router_capacity: self.router_capacity,
            metrics: self.ctx.metrics.snapshot(),
            routers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StrategyKind, TopologyConfig};

    fn small() -> SimConfig {
        let mut config = SimConfig::default();
        config.topology = TopologyConfig::KaryTree {
            k: 2,
            height: 3,
            prefix: "p".into(),
        };
        config.workload.files_per_prefix = 5;
        config.workload.chunks_per_file = 4;
        config.workload.capacity_factor = 0.5;
        config.response_target = 200;
        config
    }

    #[test]
    fn test_run_reaches_target() {
        let mut sim = Simulation::new(small()).unwrap();
        let report = sim.run().unwrap();
        assert!(report.metrics.responses >= 200);
        assert_eq!(report.nodes, 7);
        assert_eq!(report.users, 4);
        assert_eq!(report.routers.len(), 2);
        // 5 files * 4 chunks * 1024 bytes * 0.5 over two routers
        assert_eq!(report.router_capacity, 5120);
        assert!(report.metrics.cs_hits > 0);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let a = Simulation::new(small()).unwrap().run().unwrap();
        let b = Simulation::new(small()).unwrap().run().unwrap();
        assert_eq!(a.rounds, b.rounds);
        assert_eq!(a.metrics.cs_hits, b.metrics.cs_hits);
        assert_eq!(a.metrics.measured_hops, b.metrics.measured_hops);
    }

    #[test]
    fn test_round_limit() {
        let mut config = small();
        config.response_target = u64::MAX;
        config.max_rounds = Some(3);
        let report = Simulation::new(config).unwrap().run().unwrap();
        assert_eq!(report.rounds, 3);
    }

    #[test]
    fn test_static_only_run() {
        let mut config = small();
        config.strategy.kind = StrategyKind::StaticOnly;
        config.strategy.cache_probability = 1.0;
        let report = Simulation::new(config).unwrap().run().unwrap();
        assert!(report.metrics.responses >= 200);
        assert_eq!(report.metrics.dfib_installs, 0);
        assert!(report.strategy.starts_with("static-only"));
    }

    #[test]
    fn test_fib_tick_expires_routes() {
        let mut config = small();
        config.fib_tick.every_rounds = 1;
        config.fib_tick.deviation = 100;
        config.response_target = 50;
        let mut sim = Simulation::new(config).unwrap();
        sim.run().unwrap();
        assert!(sim.network().nodes().all(|n| n.dynamic_fib_size() == 0));
    }

    #[test]
    fn test_rejects_network_without_users() {
        let mut config = small();
        config.topology = TopologyConfig::Explicit {
            nodes: 2,
            links: vec![(0, 1)],
            producers: vec![crate::config::ProducerConfig {
                node: 0,
                prefix: "p".into(),
            }],
            users: vec![],
        };
        assert!(matches!(Simulation::new(config), Err(Error::Topology(_))));
    }
}
