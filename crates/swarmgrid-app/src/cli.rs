//! Command-line surface for the headless host.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use swarmgrid_core::SwarmConfig;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "swarmgrid",
    version,
    about = "Run a swarmgrid world headless with scripted selection"
)]
pub struct Cli {
    /// JSON file holding a `SwarmConfig`; missing fields take their defaults.
    #[arg(long, env = "SWARMGRID_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured population.
    #[arg(long)]
    pub agents: Option<usize>,

    /// Number of ticks to run.
    #[arg(long, default_value_t = 600)]
    pub ticks: u64,

    /// Override the configured RNG seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Issue a scripted selection every N ticks (0 disables).
    #[arg(long, default_value_t = 60)]
    pub select_every: u64,

    /// Log the tick rate every N ticks (0 disables).
    #[arg(long, default_value_t = 100)]
    pub report_every: u64,

    /// Print the final run summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Load the configuration file (if any), apply overrides, and validate.
    pub fn load_config(&self) -> Result<SwarmConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str::<SwarmConfig>(&raw)
                    .with_context(|| format!("failed to parse config {}", path.display()))?
            }
            None => SwarmConfig::default(),
        };
        if let Some(agents) = self.agents {
            config.population = agents;
        }
        if let Some(seed) = self.seed {
            config.rng_seed = Some(seed);
        }
        config.validate().context("invalid swarmgrid configuration")?;
        Ok(config)
    }
}
