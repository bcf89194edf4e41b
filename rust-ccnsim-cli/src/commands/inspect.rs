//! `inspect` command implementation

use anyhow::Result;
use std::path::PathBuf;

use crate::utils::{format_bytes, print_header};
use crate::Overrides;

/// Responses an inspection run stops at unless overridden.
const INSPECT_RESPONSES: u64 = 200;

/// Run short experiments and print the table sizes of every router
pub async fn inspect(config: Option<PathBuf>, mut overrides: Overrides) -> Result<()> {
    overrides.responses = overrides.responses.or(Some(INSPECT_RESPONSES));
    let experiments = super::load_experiments(config.as_deref(), &overrides)?;
    let reports = super::run::execute(experiments).await?;

    for report in reports {
        print_header(&format!("Routers after {} responses ({})", report.metrics.responses, report.name));
        println!(
            "{:<12} {:>8} {:>12} {:>12} {:>6} {:>6} {:>6} {:>8}",
            "router", "objects", "capacity", "remaining", "PIT", "SFIB", "DFIB", "cached"
        );
        for router in &report.routers {
            let cs = &router.content_store;
            println!(
                "{:<12} {:>8} {:>12} {:>12} {:>6} {:>6} {:>6} {:>8}",
                format!("NodeId({})", router.id),
                cs.entries,
                format_bytes(cs.capacity),
                format_bytes(cs.remaining_capacity),
                router.pit_size,
                router.static_fib_size,
                router.dynamic_fib_size,
                router.counters.packets_cached
            );
            if let Some((prefix, count)) = cs.per_prefix.iter().max_by_key(|(_, count)| *count) {
                println!("{:<12} busiest prefix {} ({} objects)", "", prefix, count);
            }
        }
    }
    Ok(())
}
