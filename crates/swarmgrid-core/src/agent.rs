//! Agent kinematics, the target-seeking state machine, and the arena that owns agents.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::AgentId;
use crate::config::SwarmConfig;
use crate::geometry::{Position, Vec2, Velocity, is_aligned, normalize};

/// Scalar fields used when inserting an agent into a world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentData {
    pub position: Position,
    pub velocity: Velocity,
    /// Signed thrust magnitude; zero means the agent is not accelerating.
    pub acceleration: f64,
    /// Default target point.
    pub target: Position,
    /// Whether the agent is currently steering toward `target`.
    pub has_target: bool,
}

impl AgentData {
    /// An agent at rest at `position` whose default target is `target` (inactive).
    #[must_use]
    pub const fn at_rest(position: Position, target: Position) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            acceleration: 0.0,
            target,
            has_target: false,
        }
    }
}

impl Default for AgentData {
    fn default() -> Self {
        Self::at_rest(Position::default(), Position::default())
    }
}

/// Motion mode derived from an agent's fields.
///
/// Arrival is instantaneous: an arriving agent goes straight back to `Idle`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MotionState {
    Idle,
    Seeking,
    Braking,
    Drifting,
}

/// What happened to an agent during the integration half of its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Advance {
    /// Nothing to do; position unchanged and no reindex needed.
    Resting,
    /// The agent stopped this tick (target reached or drift died out).
    Arrived,
    /// The agent integrated a new position.
    Moved,
}

/// A point agent with its kinematic and selection state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    position: Position,
    prev_position: Position,
    velocity: Velocity,
    acceleration: f64,
    target: Position,
    has_target: bool,
    selected: bool,
    near: bool,
}

impl From<AgentData> for Agent {
    fn from(data: AgentData) -> Self {
        Self {
            position: data.position,
            prev_position: data.position,
            velocity: data.velocity,
            acceleration: data.acceleration,
            target: data.target,
            has_target: data.has_target,
            selected: false,
            near: false,
        }
    }
}

impl Agent {
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Position before the most recent integration step.
    #[must_use]
    pub const fn prev_position(&self) -> Position {
        self.prev_position
    }

    #[must_use]
    pub const fn velocity(&self) -> Velocity {
        self.velocity
    }

    #[must_use]
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Signed thrust magnitude.
    #[must_use]
    pub const fn acceleration(&self) -> f64 {
        self.acceleration
    }

    /// Active target, if the agent is steering toward one.
    #[must_use]
    pub const fn target(&self) -> Option<Position> {
        if self.has_target {
            Some(self.target)
        } else {
            None
        }
    }

    /// Default target point, whether or not it is active.
    #[must_use]
    pub const fn default_target(&self) -> Position {
        self.target
    }

    #[must_use]
    pub const fn has_target(&self) -> bool {
        self.has_target
    }

    #[must_use]
    pub const fn is_selected(&self) -> bool {
        self.selected
    }

    /// Proximity highlight flag.
    #[must_use]
    pub const fn is_near(&self) -> bool {
        self.near
    }

    #[must_use]
    pub fn motion_state(&self) -> MotionState {
        match (self.has_target, self.acceleration) {
            (true, a) if a < 0.0 => MotionState::Braking,
            (true, _) => MotionState::Seeking,
            (false, a) if a != 0.0 => MotionState::Drifting,
            (false, _) => MotionState::Idle,
        }
    }

    /// Snapshot of the scalar fields.
    #[must_use]
    pub const fn data(&self) -> AgentData {
        AgentData {
            position: self.position,
            velocity: self.velocity,
            acceleration: self.acceleration,
            target: self.target,
            has_target: self.has_target,
        }
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub(crate) fn set_near(&mut self, near: bool) {
        self.near = near;
    }

    /// Point the agent at `target` and start steering.
    pub(crate) fn assign_target(&mut self, target: Position) {
        self.target = target;
        self.has_target = true;
    }

    /// Start steering toward the default target.
    pub(crate) fn activate_target(&mut self) {
        self.has_target = true;
    }

    pub(crate) fn set_velocity(&mut self, velocity: Velocity) {
        self.velocity = velocity;
    }

    /// Give a resting agent a braking thrust so it drifts to a stop after being struck.
    pub(crate) fn start_braking(&mut self, thrust: f64) {
        self.acceleration = -thrust;
    }

    /// Shift the agent by `offset`, keeping it inside the world. Returns the shift actually applied.
    pub(crate) fn displace(&mut self, offset: Vec2, width: f64, height: f64) -> Vec2 {
        let before = self.position;
        self.position += offset;
        self.position.x = self.position.x.clamp(0.0, width);
        self.position.y = self.position.y.clamp(0.0, height);
        self.position - before
    }

    /// Run the motion state machine for one timestep, up to and including the wall bounce.
    pub(crate) fn advance(&mut self, config: &SwarmConfig) -> Advance {
        if self.acceleration == 0.0 && !self.selected && !self.has_target {
            return Advance::Resting;
        }

        let thrust = config.thrust;
        if self.has_target {
            self.acceleration = thrust;
        }

        let to_target = self.target - self.position;
        let distance = to_target.length();
        let speed = self.velocity.length();

        let arrived = if self.has_target {
            distance < config.arrival_radius && speed < config.arrival_speed
        } else {
            speed < config.rest_speed
        };
        if arrived {
            return self.halt();
        }

        if self.has_target {
            let stopping_distance = speed * speed / (2.0 * thrust);
            let heading_to_target = is_aligned(
                normalize(self.velocity, 1.0),
                normalize(to_target, 1.0),
                config.alignment_tolerance,
            );
            if stopping_distance > distance && heading_to_target {
                self.acceleration = -thrust;
            }
        }

        let heading = if self.has_target {
            to_target
        } else {
            self.position - self.prev_position
        };
        let accel = normalize(heading, self.acceleration);

        self.prev_position = self.position;
        let dt = config.timestep;
        self.position += self.velocity * dt + accel * (0.5 * dt * dt);
        self.velocity += accel * dt;

        self.bounce(config.world_width, config.world_height);
        Advance::Moved
    }

    fn halt(&mut self) -> Advance {
        let was_moving =
            self.has_target || self.acceleration != 0.0 || self.velocity != Vec2::ZERO;
        self.has_target = false;
        self.acceleration = 0.0;
        self.velocity = Vec2::ZERO;
        if was_moving {
            Advance::Arrived
        } else {
            Advance::Resting
        }
    }

    fn bounce(&mut self, width: f64, height: f64) {
        bounce_axis(&mut self.position.x, &mut self.velocity.x, width);
        bounce_axis(&mut self.position.y, &mut self.velocity.y, height);
    }
}

fn bounce_axis(position: &mut f64, velocity: &mut f64, bound: f64) {
    if *position < 0.0 {
        *position = 0.0;
        *velocity = -*velocity;
    } else if *position > bound {
        *position = bound;
        *velocity = -*velocity;
    }
}

/// Dense agent storage with generational handles.
///
/// Agents are never removed during a run, so dense order is insertion order.
#[derive(Debug, Default)]
pub struct AgentArena {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    agents: Vec<Agent>,
}

impl AgentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            handles: Vec::new(),
            agents: Vec::new(),
        }
    }

    /// Create an arena with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            handles: Vec::with_capacity(capacity),
            agents: Vec::with_capacity(capacity),
        }
    }

    /// Number of agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns true when no agents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Iterate over agent handles in dense iteration order.
    pub fn iter_handles(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.handles.iter().copied()
    }

    /// Iterate over `(handle, agent)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> + '_ {
        self.handles.iter().copied().zip(self.agents.iter())
    }

    /// Returns the dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Returns true if `id` refers to a stored agent.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.index_of(id).map(|index| &self.agents[index])
    }

    pub(crate) fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        let index = self.index_of(id)?;
        self.agents.get_mut(index)
    }

    /// Handle stored at dense `index`.
    pub(crate) fn handle_at(&self, index: usize) -> AgentId {
        self.handles[index]
    }

    pub(crate) fn at(&self, index: usize) -> &Agent {
        &self.agents[index]
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> &mut Agent {
        &mut self.agents[index]
    }

    /// Mutably borrow two distinct agents by dense index.
    pub(crate) fn pair_mut(&mut self, first: usize, second: usize) -> (&mut Agent, &mut Agent) {
        debug_assert_ne!(first, second, "an agent cannot collide with itself");
        if first < second {
            let (head, tail) = self.agents.split_at_mut(second);
            (&mut head[first], &mut tail[0])
        } else {
            let (head, tail) = self.agents.split_at_mut(first);
            (&mut tail[0], &mut head[second])
        }
    }

    /// Insert a new agent and return its handle.
    pub(crate) fn insert(&mut self, agent: Agent) -> AgentId {
        let index = self.agents.len();
        self.agents.push(agent);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Clear all stored agents.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.agents.clear();
    }
}
