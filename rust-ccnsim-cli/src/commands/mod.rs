//! Subcommand implementations and the experiment loader they share.

pub mod inspect;
pub mod run;
pub mod topology;

use anyhow::{Context, Result};
use log::{debug, info};
use rust_ccnsim_engine::{ExperimentSet, SimConfig};
use std::path::Path;

use crate::Overrides;

/// Environment variables with this prefix override file settings, e.g.
/// `CCNSIM__SEED=4`.
const ENV_PREFIX: &str = "CCNSIM";

/// Loads the experiments in `path`, or the default experiment when no file is
/// given, then applies the command-line overrides to each.
pub fn load_experiments(path: Option<&Path>, overrides: &Overrides) -> Result<Vec<SimConfig>> {
    let mut experiments = match path {
        Some(path) => read_experiment_file(path)?,
        None => {
            debug!("No experiment file given, using defaults");
            vec![SimConfig::default()]
        }
    };

    for experiment in experiments.iter_mut() {
        apply_overrides(experiment, overrides);
        experiment
            .validate()
            .with_context(|| format!("Invalid experiment '{}'", experiment.name))?;
    }
    Ok(experiments)
}

fn read_experiment_file(path: &Path) -> Result<Vec<SimConfig>> {
    info!("Loading experiments from {}", path.display());

    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let set: ExperimentSet = settings
        .clone()
        .try_deserialize()
        .with_context(|| format!("Failed to parse experiments in {}", path.display()))?;
    if !set.experiments.is_empty() {
        return Ok(set.experiments);
    }

    // a file without [[experiments]] describes a single run
    let single: SimConfig = settings
        .try_deserialize()
        .with_context(|| format!("Failed to parse experiment in {}", path.display()))?;
    Ok(vec![single])
}

fn apply_overrides(config: &mut SimConfig, overrides: &Overrides) {
    if let Some(seed) = overrides.seed {
        config.seed = seed;
    }
    if let Some(strategy) = overrides.strategy {
        config.strategy.kind = strategy.into();
    }
    if let Some(p) = overrides.cache_probability {
        config.strategy.cache_probability = p;
    }
    if let Some(responses) = overrides.responses {
        config.response_target = responses;
    }
}
