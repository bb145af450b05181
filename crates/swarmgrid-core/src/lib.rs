//! Core types and the tick loop for the swarmgrid agent world.
//!
//! A [`WorldState`] owns a population of point agents, a [`StaggeredGridIndex`] over their
//! positions, and the selection state driven by a host. Each call to [`WorldState::step`]
//! advances every agent once, in insertion order: integrate motion, bounce off walls, resolve at
//! most one contact, then reindex.

pub mod agent;
pub mod collision;
pub mod command;
pub mod config;
pub mod geometry;
pub mod world;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use thiserror::Error;

pub use agent::{Agent, AgentArena, AgentData, MotionState};
pub use collision::{CollisionError, ContactVelocities, kinetic_energy, resolve_elastic};
pub use command::{HostCommand, apply_host_command};
pub use config::{ContactPolicy, InitialTarget, SwarmConfig};
pub use geometry::{Position, Vec2, Velocity};
pub use swarmgrid_index::{IndexError, NeighborhoodIndex, StaggeredGridIndex};
pub use world::{ContactRecord, TickEvents, TickSummary, WorldState};

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// High level simulation clock (ticks processed since the world was built).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Errors that can occur when constructing or mutating world state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldStateError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A spawn position outside the world rectangle.
    #[error("position ({x}, {y}) lies outside the {width}x{height} world")]
    OutOfWorld {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// A point with a NaN or infinite coordinate.
    #[error("point ({x}, {y}) is not finite")]
    InvalidPoint { x: f64, y: f64 },
    /// The handle does not refer to an agent in this world.
    #[error("unknown agent {0:?}")]
    UnknownAgent(AgentId),
    /// The index does not hold the agent at its current position.
    #[error("index is stale for agent {0:?}")]
    StaleIndex(AgentId),
    #[error(transparent)]
    Index(#[from] IndexError),
}
