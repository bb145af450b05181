//! World state and the per-tick agent pipeline.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use ordered_float::OrderedFloat;
use rand::Rng;
use serde::{Deserialize, Serialize};
use swarmgrid_index::{NeighborhoodIndex, StaggeredGridIndex};
use tracing::{debug, error, info, warn};

use crate::agent::{Advance, Agent, AgentArena, AgentData, MotionState};
use crate::collision::{CollisionError, kinetic_energy, resolve_elastic, separation_offset};
use crate::config::{ContactPolicy, InitialTarget, SwarmConfig};
use crate::geometry::{Position, Vec2, distance, normalize};
use crate::{AgentId, Tick, WorldStateError};

/// One resolved contact: `agent` ran into `other` while being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub agent: AgentId,
    pub other: AgentId,
}

/// Events emitted after a world step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    pub tick: Tick,
    /// Agents that integrated a new position.
    pub moved: usize,
    pub collisions: usize,
    pub arrivals: usize,
    /// Agents whose reindex was skipped after an index error.
    pub index_failures: usize,
    /// Resolved contacts in processing order.
    pub contacts: Vec<ContactRecord>,
}

/// Summary retained in the world's history each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub agent_count: usize,
    /// Agents not in [`MotionState::Idle`] after the tick.
    pub moving: usize,
    pub collisions: usize,
    pub arrivals: usize,
    pub kinetic_energy: f64,
}

/// Simulation world holding agents, the neighbourhood index, and selection state.
pub struct WorldState {
    config: SwarmConfig,
    tick: Tick,
    agents: AgentArena,
    index: StaggeredGridIndex<AgentId>,
    selected: Option<AgentId>,
    highlighted: Vec<AgentId>,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("agent_count", &self.agents.len())
            .field("selected", &self.selected)
            .finish()
    }
}

impl WorldState {
    /// Instantiate an empty world from the provided configuration.
    pub fn new(config: SwarmConfig) -> Result<Self, WorldStateError> {
        config.validate()?;
        let index =
            StaggeredGridIndex::new(config.cell_size, config.world_width, config.world_height)?;
        let history_capacity = config.history_capacity;
        Ok(Self {
            agents: AgentArena::with_capacity(config.population),
            index,
            tick: Tick::zero(),
            selected: None,
            highlighted: Vec::new(),
            history: VecDeque::with_capacity(history_capacity),
            config,
        })
    }

    /// Seed `config.population` resting agents at uniform random positions.
    ///
    /// Each agent's default target comes from `policy`; no target is active until a host
    /// selects the agent.
    pub fn create_population<R: Rng>(
        config: SwarmConfig,
        rng: &mut R,
        policy: InitialTarget,
    ) -> Result<Self, WorldStateError> {
        let mut world = Self::new(config)?;
        let (width, height) = (world.config.world_width, world.config.world_height);
        for _ in 0..world.config.population {
            let position = Position::new(
                rng.random_range(0.0..=width),
                rng.random_range(0.0..=height),
            );
            let target = policy.sample(rng, width, height);
            world.spawn_agent(AgentData::at_rest(position, target))?;
        }
        info!(
            agents = world.agents.len(),
            width, height, "seeded swarmgrid population"
        );
        Ok(world)
    }

    /// Insert an agent and register it with the index.
    pub fn spawn_agent(&mut self, data: AgentData) -> Result<AgentId, WorldStateError> {
        let Vec2 { x, y } = data.position;
        if !data.position.is_finite() || !data.velocity.is_finite() || !data.target.is_finite() {
            return Err(WorldStateError::InvalidPoint { x, y });
        }
        if !self.config.contains(data.position) {
            return Err(WorldStateError::OutOfWorld {
                x,
                y,
                width: self.config.world_width,
                height: self.config.world_height,
            });
        }
        self.index.keys_for(data.position.as_tuple())?;
        let id = self.agents.insert(Agent::from(data));
        self.index.insert_initial(id, data.position.as_tuple())?;
        Ok(id)
    }

    /// Advance every agent by one timestep, in insertion order.
    pub fn step(&mut self) -> TickEvents {
        let next_tick = self.tick.next();
        let mut events = TickEvents {
            tick: next_tick,
            ..TickEvents::default()
        };
        for index in 0..self.agents.len() {
            self.tick_agent(index, &mut events);
        }
        self.tick = next_tick;
        self.record_summary(&events);
        events
    }

    /// Alias for [`WorldState::step`].
    pub fn tick_all(&mut self) -> TickEvents {
        self.step()
    }

    fn tick_agent(&mut self, index: usize, events: &mut TickEvents) {
        let id = self.agents.handle_at(index);
        let previous = self.agents.at(index).position();

        match self.agents.at_mut(index).advance(&self.config) {
            Advance::Resting => return,
            Advance::Arrived => {
                events.arrivals += 1;
                debug!(?id, x = previous.x, y = previous.y, "agent came to rest");
                return;
            }
            Advance::Moved => events.moved += 1,
        }

        let position = self.agents.at(index).position();
        if let Some((other_index, other)) = self.find_contact(id, position) {
            let other_before = self.agents.at(other_index).position();
            self.resolve_contact(index, other_index);
            events.collisions += 1;
            events.contacts.push(ContactRecord { agent: id, other });
            debug!(?id, ?other, "resolved contact");

            let other_after = self.agents.at(other_index).position();
            if other_after != other_before {
                self.reindex_agent(other, other_before, other_after, events);
            }
        }

        let current = self.agents.at(index).position();
        self.reindex_agent(id, previous, current, events);
    }

    fn reindex_agent(
        &mut self,
        id: AgentId,
        previous: Position,
        current: Position,
        events: &mut TickEvents,
    ) {
        if let Err(err) = self
            .index
            .reindex(id, previous.as_tuple(), current.as_tuple())
        {
            error!(?id, %err, "failed to reindex agent; keeping its previous cells");
            debug_assert!(false, "reindex failed for {id:?}: {err}");
            events.index_failures += 1;
        }
    }

    /// Pick the overlapping neighbour `id` should resolve against, if any.
    fn find_contact(&self, id: AgentId, position: Position) -> Option<(usize, AgentId)> {
        let contact_distance = self.config.contact_distance();
        let mut overlapping = self
            .index
            .query(position.as_tuple())
            .into_iter()
            .filter(|&other| other != id)
            .filter_map(|other| {
                let other_index = self.agents.index_of(other)?;
                let gap = distance(position, self.agents.at(other_index).position());
                (gap <= contact_distance).then_some((other_index, other, gap))
            });

        let (other_index, other, _) = match self.config.contact_policy {
            ContactPolicy::FirstFound => overlapping.next()?,
            ContactPolicy::Nearest => {
                overlapping.min_by_key(|&(_, other, gap)| (OrderedFloat(gap), other))?
            }
        };
        Some((other_index, other))
    }

    fn resolve_contact(&mut self, index: usize, other_index: usize) {
        let thrust = self.config.thrust;
        let contact_distance = self.config.contact_distance();
        let epsilon = self.config.separation_epsilon;
        let (width, height) = (self.config.world_width, self.config.world_height);
        let centre = Position::new(width * 0.5, height * 0.5);

        let (agent, other) = self.agents.pair_mut(index, other_index);
        match resolve_elastic(
            agent.position(),
            agent.velocity(),
            other.position(),
            other.velocity(),
        ) {
            Ok(velocities) => {
                agent.set_velocity(velocities.first);
                other.set_velocity(velocities.second);
                if other.acceleration() == 0.0 {
                    other.start_braking(thrust);
                }
                if let Some(offset) =
                    separation_offset(agent.position(), other.position(), contact_distance, epsilon)
                {
                    push_apart(agent, other, offset, width, height);
                }
            }
            Err(CollisionError::CoincidentCentres { x, y }) => {
                warn!(x, y, "agents share a centre; nudging apart without exchanging velocity");
                let axis = fallback_axis(agent, centre);
                push_apart(
                    agent,
                    other,
                    axis * (contact_distance + epsilon),
                    width,
                    height,
                );
            }
        }
    }

    fn record_summary(&mut self, events: &TickEvents) {
        let summary = TickSummary {
            tick: events.tick,
            agent_count: self.agents.len(),
            moving: self
                .agents
                .iter()
                .filter(|(_, agent)| agent.motion_state() != MotionState::Idle)
                .count(),
            collisions: events.collisions,
            arrivals: events.arrivals,
            kinetic_energy: self.kinetic_energy(),
        };
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
    }

    /// Send `id` toward `point`, clamped into the world.
    pub fn set_target(&mut self, id: AgentId, point: Position) -> Result<(), WorldStateError> {
        if !point.is_finite() {
            return Err(WorldStateError::InvalidPoint {
                x: point.x,
                y: point.y,
            });
        }
        let target = self.config.clamp_to_world(point);
        let agent = self
            .agents
            .get_mut(id)
            .ok_or(WorldStateError::UnknownAgent(id))?;
        agent.assign_target(target);
        debug!(?id, x = target.x, y = target.y, "target assigned");
        Ok(())
    }

    /// Select `id`, deselecting any previous agent, and activate its default target.
    pub fn select(&mut self, id: AgentId) -> Result<(), WorldStateError> {
        if !self.agents.contains(id) {
            return Err(WorldStateError::UnknownAgent(id));
        }
        self.clear_selection();
        if let Some(agent) = self.agents.get_mut(id) {
            agent.set_selected(true);
            agent.activate_target();
        }
        self.selected = Some(id);
        debug!(?id, "agent selected");
        Ok(())
    }

    /// Deselect the current agent, if any. Its target stays active.
    pub fn clear_selection(&mut self) {
        if let Some(agent) = self
            .selected
            .take()
            .and_then(|previous| self.agents.get_mut(previous))
        {
            agent.set_selected(false);
        }
    }

    /// Currently selected agent.
    #[must_use]
    pub const fn selected(&self) -> Option<AgentId> {
        self.selected
    }

    /// Agents in the 3x3 cell neighbourhood of `point`.
    #[must_use]
    pub fn query_near(&self, point: Position) -> BTreeSet<AgentId> {
        self.index.query(point.as_tuple())
    }

    /// Neighbourhood of agent `id`, excluding the agent itself.
    pub fn query_near_agent(&self, id: AgentId) -> Result<BTreeSet<AgentId>, WorldStateError> {
        let agent = self.agent(id).ok_or(WorldStateError::UnknownAgent(id))?;
        let mut group = self.query_near(agent.position());
        group.remove(&id);
        Ok(group)
    }

    /// Nearest agent strictly within `pick_radius` of `point`.
    #[must_use]
    pub fn pick_at(&self, point: Position) -> Option<AgentId> {
        let radius = self.config.pick_radius;
        self.query_near(point)
            .into_iter()
            .filter_map(|id| {
                let gap = distance(point, self.agent(id)?.position());
                (gap < radius).then_some((OrderedFloat(gap), id))
            })
            .min()
            .map(|(_, id)| id)
    }

    /// Replace the near flags with the agents within `highlight_radius` of `point`.
    pub fn highlight_near(&mut self, point: Position) -> usize {
        for id in self.highlighted.drain(..) {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.set_near(false);
            }
        }
        let radius = self.config.highlight_radius;
        let near: Vec<AgentId> = self
            .query_near(point)
            .into_iter()
            .filter(|&id| {
                self.agent(id)
                    .is_some_and(|agent| distance(point, agent.position()) <= radius)
            })
            .collect();
        for &id in &near {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.set_near(true);
            }
        }
        self.highlighted = near;
        self.highlighted.len()
    }

    /// Agents currently flagged as near.
    #[must_use]
    pub fn highlighted(&self) -> &[AgentId] {
        &self.highlighted
    }

    /// Total kinetic energy of the population.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        kinetic_energy(self.agents.iter().map(|(_, agent)| agent.velocity()))
    }

    /// Check that every agent sits in exactly one bucket per layer, keyed by its position.
    ///
    /// Scans every bucket once per agent.
    pub fn validate_index(&self) -> Result<(), WorldStateError> {
        for (id, agent) in self.agents.iter() {
            let fresh = self.index.memberships(id) == [1; 4]
                && self.index.is_indexed_at(id, agent.position().as_tuple());
            if !fresh {
                return Err(WorldStateError::StaleIndex(id));
            }
        }
        Ok(())
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Number of agents in the world.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Borrow the agent arena.
    #[must_use]
    pub fn agents(&self) -> &AgentArena {
        &self.agents
    }

    #[must_use]
    pub fn index(&self) -> &StaggeredGridIndex<AgentId> {
        &self.index
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Drop every agent and reset the clock.
    pub fn reset(&mut self) {
        self.agents.clear();
        self.index.clear();
        self.selected = None;
        self.highlighted.clear();
        self.history.clear();
        self.tick = Tick::zero();
    }
}

/// Move `agent` by `offset`. Whatever a wall absorbs moves `other` the opposite way, so the
/// pair ends up the same distance apart as an unobstructed push would leave them.
fn push_apart(agent: &mut Agent, other: &mut Agent, offset: Vec2, width: f64, height: f64) {
    let applied = agent.displace(offset, width, height);
    let remainder = offset - applied;
    // Rounding alone leaves a remainder far below this.
    if remainder.length_squared() > 1.0e-18 {
        let moved = other.displace(-remainder, width, height);
        if (moved + remainder).length_squared() > 1.0e-18 {
            debug!("contact pinned between walls; separation left short");
        }
    }
}

/// Direction to nudge an agent whose centre coincides with its contact.
fn fallback_axis(agent: &Agent, centre: Position) -> Vec2 {
    let heading = normalize(agent.velocity(), 1.0);
    if heading != Vec2::ZERO {
        return heading;
    }
    let inward = normalize(centre - agent.position(), 1.0);
    if inward != Vec2::ZERO {
        return inward;
    }
    Vec2::new(1.0, 0.0)
}
