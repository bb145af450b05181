use anyhow::{Context, Result};
use clap::Parser;
use swarmgrid_app::{Cli, HeadlessHost, HostOptions};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.load_config()?;
    info!(
        agents = config.population,
        width = config.world_width,
        height = config.world_height,
        seed = ?config.rng_seed,
        "Starting swarmgrid headless host"
    );

    let options = HostOptions {
        select_every: cli.select_every,
        report_every: cli.report_every,
    };
    let mut host = HeadlessHost::bootstrap(config, options)?;
    let summary = host.run(cli.ticks)?;

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("failed to encode summary")?;
        println!("{json}");
    } else {
        info!(
            ticks = summary.ticks,
            collisions = summary.collisions,
            arrivals = summary.arrivals,
            moving = summary.moving,
            kinetic_energy = summary.kinetic_energy,
            ticks_per_second = summary.ticks_per_second,
            "Run complete"
        );
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
