//! World configuration and validation.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};

use crate::WorldStateError;
use crate::geometry::Position;

/// How an agent chooses between several overlapping neighbours in one tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContactPolicy {
    /// Closest overlapping neighbour; equal distances go to the smaller handle.
    #[default]
    Nearest,
    /// First overlapping neighbour in handle order.
    FirstFound,
}

/// Default target assigned to each agent when a population is seeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitialTarget {
    /// Uniformly random point inside the world.
    #[default]
    Random,
    /// Centre of the world.
    Centre,
    /// The same fixed point for every agent.
    Fixed(Position),
}

impl InitialTarget {
    /// Pick a default target inside a `width` x `height` world.
    pub fn sample<R: Rng>(&self, rng: &mut R, width: f64, height: f64) -> Position {
        match *self {
            InitialTarget::Random => Position::new(
                rng.random_range(0.0..=width),
                rng.random_range(0.0..=height),
            ),
            InitialTarget::Centre => Position::new(width * 0.5, height * 0.5),
            InitialTarget::Fixed(point) => {
                Position::new(point.x.clamp(0.0, width), point.y.clamp(0.0, height))
            }
        }
    }
}

/// Static configuration for a swarmgrid world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwarmConfig {
    /// Extent of the world along x.
    pub world_width: f64,
    /// Extent of the world along y.
    pub world_height: f64,
    /// Side of one spatial index cell.
    pub cell_size: f64,
    /// Radius shared by every agent.
    pub agent_radius: f64,
    /// Number of agents seeded by `create_population`.
    pub population: usize,
    /// Magnitude of thrust and braking acceleration.
    pub thrust: f64,
    /// Fixed integration step in seconds.
    pub timestep: f64,
    /// Distance to the target under which a slow agent counts as arrived.
    pub arrival_radius: f64,
    /// Speed under which a targeted agent may arrive.
    pub arrival_speed: f64,
    /// Speed under which an untargeted, drifting agent comes to rest.
    pub rest_speed: f64,
    /// Maximum unit-vector difference sum for velocity and target heading to count as aligned.
    pub alignment_tolerance: f64,
    /// Extra clearance added when pushing overlapping agents apart.
    pub separation_epsilon: f64,
    /// Maximum distance from a point at which `pick_at` selects an agent.
    pub pick_radius: f64,
    /// Distance within which `highlight_near` flags agents.
    pub highlight_radius: f64,
    /// Neighbour choice when several agents overlap.
    pub contact_policy: ContactPolicy,
    /// Default target policy for seeded populations.
    pub initial_target: InitialTarget,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in-memory.
    pub history_capacity: usize,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            world_width: 800.0,
            world_height: 600.0,
            cell_size: 100.0,
            agent_radius: 10.0,
            population: 100,
            thrust: 100.0,
            timestep: 1.0 / 60.0,
            arrival_radius: 5.0,
            arrival_speed: 7.07,
            rest_speed: 1.0,
            alignment_tolerance: 0.1,
            separation_epsilon: 0.1,
            pick_radius: 10.0,
            highlight_radius: 100.0,
            contact_policy: ContactPolicy::Nearest,
            initial_target: InitialTarget::Random,
            rng_seed: None,
            history_capacity: 256,
        }
    }
}

impl SwarmConfig {
    /// Validates the configuration before a world is built from it.
    pub fn validate(&self) -> Result<(), WorldStateError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        let non_negative = |value: f64| value.is_finite() && value >= 0.0;

        if !positive(self.world_width) || !positive(self.world_height) {
            return Err(WorldStateError::InvalidConfig(
                "world dimensions must be positive",
            ));
        }
        if !positive(self.cell_size) {
            return Err(WorldStateError::InvalidConfig("cell_size must be positive"));
        }
        if !positive(self.agent_radius) {
            return Err(WorldStateError::InvalidConfig(
                "agent_radius must be positive",
            ));
        }
        // Contacts are only searched in the 3x3 cell neighbourhood.
        if self.agent_radius * 2.0 > self.cell_size {
            return Err(WorldStateError::InvalidConfig(
                "cell_size must be at least twice agent_radius",
            ));
        }
        if !positive(self.thrust) || !positive(self.timestep) {
            return Err(WorldStateError::InvalidConfig(
                "thrust and timestep must be positive",
            ));
        }
        if !non_negative(self.arrival_radius)
            || !non_negative(self.arrival_speed)
            || !non_negative(self.rest_speed)
            || !non_negative(self.alignment_tolerance)
            || !non_negative(self.separation_epsilon)
            || !non_negative(self.pick_radius)
            || !non_negative(self.highlight_radius)
        {
            return Err(WorldStateError::InvalidConfig(
                "arrival, alignment, separation, pick, and highlight thresholds must be non-negative",
            ));
        }
        // Picking and highlighting read a single 3x3 neighbourhood query.
        if self.pick_radius > self.cell_size || self.highlight_radius > self.cell_size {
            return Err(WorldStateError::InvalidConfig(
                "pick_radius and highlight_radius must not exceed cell_size",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WorldStateError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Distance between centres at which two agents touch.
    #[must_use]
    pub fn contact_distance(&self) -> f64 {
        self.agent_radius * 2.0
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Clamp `point` into the world rectangle.
    #[must_use]
    pub fn clamp_to_world(&self, point: Position) -> Position {
        Position::new(
            point.x.clamp(0.0, self.world_width),
            point.y.clamp(0.0, self.world_height),
        )
    }

    /// Returns true when `point` lies inside the world rectangle.
    #[must_use]
    pub fn contains(&self, point: Position) -> bool {
        point.is_finite()
            && (0.0..=self.world_width).contains(&point.x)
            && (0.0..=self.world_height).contains(&point.y)
    }
}
