//! `topology` command implementation

use anyhow::{Context, Result};
use log::info;
use rust_ccnsim_common::types::NodeRole;
use rust_ccnsim_engine::Simulation;
use std::path::PathBuf;

use crate::utils::{format_bytes, print_header};
use crate::Overrides;

/// Print nodes, links and seeded static routes for every configured experiment
pub fn show_topology(config: Option<PathBuf>) -> Result<()> {
    let experiments = super::load_experiments(config.as_deref(), &Overrides::default())?;

    for experiment in experiments {
        let name = experiment.name.clone();
        let sim = Simulation::new(experiment)
            .with_context(|| format!("Failed to build experiment '{}'", name))?;
        let topology = sim.topology();
        info!("Showing topology of '{}'", name);

        print_header(&format!("Topology {}", name));
        println!(
            "{} nodes, {} links",
            topology.node_count(),
            topology.links().len()
        );
        for (producer, prefix) in topology.prefixes() {
            println!("Prefix {} served by {}", prefix, producer);
        }
        println!();

        for node in sim.network().nodes() {
            let capacity = match node.role() {
                NodeRole::Router => format_bytes(node.content_store().capacity()),
                _ => "-".to_string(),
            };
            println!(
                "{:<12} {:<9} degree {:<3} capacity {}",
                node.id().to_string(),
                node.role().to_string(),
                node.links().len(),
                capacity
            );
            for (prefix, route) in node.static_fib().routes() {
                println!(
                    "    {} -> {} (metric {})",
                    prefix, route.face, route.metric
                );
            }
        }
    }
    Ok(())
}
