//! Protocol engine for the ccnsim content-centric network simulator.
//!
//! Each simulated node owns a content store, a PIT, a static FIB and a
//! dynamic FIB, and runs the Interest/Data state machine over them. Nodes are
//! kept in a [`Network`] registry that carries every message and remote table
//! update between them, and a [`Simulation`] drives the registry in rounds.

pub mod config;
pub mod context;
pub mod cs;
pub mod dynamic_fib;
pub mod fib;
pub mod network;
pub mod node;
pub mod outbox;
pub mod pit;
pub mod simulation;
pub mod strategy;
pub mod tiebreak;
pub mod topology;
pub mod workload;

pub use config::{ExperimentSet, SimConfig};
pub use context::{MeasurementWindow, SimContext};
pub use network::Network;
pub use node::{Node, NodeOptions};
pub use simulation::{SimReport, Simulation};
pub use strategy::{CachePolicy, Strategy};
pub use topology::Topology;
