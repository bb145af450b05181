//! Headless host loop: scripted selection, proximity highlighting, and tick-rate reports.

use std::time::Instant;

use anyhow::{Context, Result};
use rand::{Rng, rngs::SmallRng};
use serde::Serialize;
use swarmgrid_core::{AgentId, HostCommand, Position, SwarmConfig, WorldState, apply_host_command};
use tracing::{debug, info};

/// Cadence settings for a headless run.
#[derive(Debug, Clone, Copy)]
pub struct HostOptions {
    /// Ticks between scripted selections; 0 disables them.
    pub select_every: u64,
    /// Ticks between tick-rate reports; 0 disables them.
    pub report_every: u64,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            select_every: 60,
            report_every: 100,
        }
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub agents: usize,
    pub collisions: u64,
    pub arrivals: u64,
    pub index_failures: u64,
    pub selections: u64,
    pub moving: usize,
    pub kinetic_energy: f64,
    pub elapsed_secs: f64,
    pub ticks_per_second: f64,
}

/// Drives a [`WorldState`] without a display, standing in for mouse input.
pub struct HeadlessHost {
    world: WorldState,
    rng: SmallRng,
    options: HostOptions,
}

impl HeadlessHost {
    /// Seed a population from `config` and wrap it in a host.
    pub fn bootstrap(config: SwarmConfig, options: HostOptions) -> Result<Self> {
        let mut rng = config.seeded_rng();
        let policy = config.initial_target;
        let world = WorldState::create_population(config, &mut rng, policy)
            .context("failed to seed swarmgrid population")?;
        Ok(Self {
            world,
            rng,
            options,
        })
    }

    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Run `ticks` world steps, issuing host commands between them.
    pub fn run(&mut self, ticks: u64) -> Result<RunSummary> {
        let started = Instant::now();
        let mut window_start = started;
        let mut collisions = 0;
        let mut arrivals = 0;
        let mut index_failures = 0;
        let mut selections = 0;

        for tick in 0..ticks {
            if self.options.select_every > 0
                && tick % self.options.select_every == 0
                && self.scripted_selection()?
            {
                selections += 1;
            }

            let events = self.world.step();
            collisions += events.collisions as u64;
            arrivals += events.arrivals as u64;
            index_failures += events.index_failures as u64;

            if let Some(agent) = self.world.selected().and_then(|id| self.world.agent(id)) {
                let point = agent.position();
                apply_host_command(&mut self.world, HostCommand::Highlight { point })?;
            }

            let done = tick + 1;
            if self.options.report_every > 0 && done % self.options.report_every == 0 {
                let window = window_start.elapsed().as_secs_f64();
                let rate = if window > 0.0 {
                    self.options.report_every as f64 / window
                } else {
                    f64::INFINITY
                };
                info!(
                    tick = events.tick.0,
                    ticks_per_second = rate,
                    collisions = events.collisions,
                    kinetic_energy = self.world.kinetic_energy(),
                    "tick rate"
                );
                window_start = Instant::now();
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        let moving = self.world.history().last().map_or(0, |summary| summary.moving);
        Ok(RunSummary {
            ticks,
            agents: self.world.agent_count(),
            collisions,
            arrivals,
            index_failures,
            selections,
            moving,
            kinetic_energy: self.world.kinetic_energy(),
            elapsed_secs: elapsed,
            ticks_per_second: if elapsed > 0.0 {
                ticks as f64 / elapsed
            } else {
                0.0
            },
        })
    }

    /// Click at a random point: select the agent under it, or send a random agent there.
    ///
    /// Returns false when the world has no agents.
    fn scripted_selection(&mut self) -> Result<bool> {
        let count = self.world.agent_count();
        if count == 0 {
            return Ok(false);
        }
        let config = self.world.config();
        let point = Position::new(
            self.rng.random_range(0.0..=config.world_width),
            self.rng.random_range(0.0..=config.world_height),
        );

        if let Some(agent) = self.world.pick_at(point) {
            debug!(?agent, x = point.x, y = point.y, "picked agent under cursor");
            apply_host_command(&mut self.world, HostCommand::Select { agent })?;
            return Ok(true);
        }

        let handles: Vec<AgentId> = self.world.agents().iter_handles().collect();
        let agent = handles[self.rng.random_range(0..count)];
        apply_host_command(&mut self.world, HostCommand::Select { agent })?;
        apply_host_command(&mut self.world, HostCommand::SetTarget { agent, point })?;
        debug!(?agent, x = point.x, y = point.y, "sent agent to cursor");
        Ok(true)
    }
}
