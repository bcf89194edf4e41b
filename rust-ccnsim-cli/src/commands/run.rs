//! `run` command: executes experiments concurrently and reports them.

use anyhow::{Context, Result};
use futures::future::join_all;
use log::info;
use rust_ccnsim_engine::{SimConfig, SimReport, Simulation};
use std::path::PathBuf;

use crate::utils::{format_bytes, format_percent, print_header, Timer};
use crate::Overrides;

/// Run every configured experiment on its own blocking worker
pub async fn run_experiments(config: Option<PathBuf>, overrides: Overrides, json: bool) -> Result<()> {
    let experiments = super::load_experiments(config.as_deref(), &overrides)?;
    let timer = Timer::new(&format!("{} experiment(s)", experiments.len()));

    let reports = execute(experiments).await?;
    for report in &reports {
        if json {
            println!(
                "{}",
                serde_json::to_string(report).context("Failed to serialize report")?
            );
        } else {
            print_report(report);
        }
    }

    info!("Ran {} experiment(s) in {}", reports.len(), timer.elapsed_str());
    Ok(())
}

/// Run experiments in parallel; reports come back in input order.
pub async fn execute(experiments: Vec<SimConfig>) -> Result<Vec<SimReport>> {
    let tasks = experiments.into_iter().map(|config| {
        tokio::task::spawn_blocking(move || {
            let name = config.name.clone();
            Simulation::new(config)
                .and_then(|mut sim| sim.run())
                .with_context(|| format!("Experiment '{}' failed", name))
        })
    });

    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.context("Experiment worker panicked")?)
        .collect()
}

fn print_report(report: &SimReport) {
    let m = &report.metrics;

    print_header(&format!("Experiment {}", report.name));
    println!("Strategy: {}", report.strategy);
    println!("Seed: {}", report.seed);
    println!(
        "Nodes: {} ({} users, {} routers)",
        report.nodes,
        report.users,
        report.routers.len()
    );
    println!("Router capacity: {}", format_bytes(report.router_capacity));
    println!("Rounds: {}", report.rounds);

    println!("\nTraffic:");
    println!("  Requests issued: {}", report.packets_issued);
    println!("  Responses: {}", m.responses);
    println!("  Interests forwarded: {}", m.interests_forwarded);
    println!("  Interests aggregated: {}", m.interests_aggregated);
    println!("  Retries: {}", m.interests_retried);
    println!("  Loop resolutions: {}", m.loop_resolutions);
    println!("  NACKs: {}", m.nacks_sent);

    println!("\nCaching:");
    println!(
        "  CS hits: {} ({} of lookups)",
        m.cs_hits,
        format_percent(m.cs_hits, m.cs_hits + m.cs_misses)
    );
    println!("  CS inserts: {}", m.cs_inserts);
    println!("  CS evictions: {}", m.cs_evictions);
    println!("  Average reuse: {:.2}", m.average_reuse);
    println!("  Dynamic FIB installs: {}", m.dfib_installs);
    println!("  Remote FIB erasures: {}", m.dfib_remote_erasures);

    println!("\nPath stretch:");
    println!("  Measured hops: {}", m.measured_hops);
    println!("  Required hops: {}", m.required_hops);
    println!("  Hop ratio: {:.4}", m.hop_ratio);
    println!("  Average stretch: {:.1}%", m.average_stretch_percent);
}
