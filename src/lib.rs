//! ccnsim: a content-centric network simulator.
//!
//! This facade re-exports the member crates:
//! - [`common`]: Interest/Data records, identifiers, errors and metrics.
//! - [`engine`]: per-node tables and forwarding strategies, the node
//!   registry, topology builders and the round-based scheduler.
//!
//! The `ccnsim` binary lives in the `rust-ccnsim-cli` crate.

pub use rust_ccnsim_common as common;
pub use rust_ccnsim_engine as engine;

pub use rust_ccnsim_common::{Error, Result};
pub use rust_ccnsim_engine::{SimConfig, SimReport, Simulation};
