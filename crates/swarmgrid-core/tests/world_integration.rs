use rand::{Rng, SeedableRng, rngs::SmallRng};
use swarmgrid_core::{
    AgentData, AgentId, ContactPolicy, HostCommand, InitialTarget, MotionState, Position,
    SwarmConfig, Tick, TickSummary, Vec2, WorldState, apply_host_command,
};

fn drifting(x: f64, y: f64, vx: f64, vy: f64, thrust: f64) -> AgentData {
    AgentData {
        position: Position::new(x, y),
        velocity: Vec2::new(vx, vy),
        acceleration: -thrust,
        target: Position::new(400.0, 300.0),
        has_target: false,
    }
}

fn seeded_world(seed: u64, population: usize) -> WorldState {
    let config = SwarmConfig {
        population,
        rng_seed: Some(seed),
        ..SwarmConfig::default()
    };
    let mut rng = config.seeded_rng();
    WorldState::create_population(config, &mut rng, InitialTarget::Random).expect("population")
}

/// Every `every` ticks, send a random agent toward a random point.
fn scripted_run(world: &mut WorldState, rng: &mut SmallRng, ticks: usize, every: usize) {
    let handles: Vec<AgentId> = world.agents().iter_handles().collect();
    let (width, height) = (world.config().world_width, world.config().world_height);
    for tick in 0..ticks {
        if tick % every == 0 {
            let agent = handles[rng.random_range(0..handles.len())];
            let point = Position::new(rng.random_range(0.0..width), rng.random_range(0.0..height));
            apply_host_command(world, HostCommand::Select { agent }).expect("select");
            apply_host_command(world, HostCommand::SetTarget { agent, point }).expect("target");
        }
        world.step();
    }
}

#[test]
fn head_on_pair_swaps_velocities_and_separates() {
    let mut world = WorldState::new(SwarmConfig::default()).expect("world");
    let thrust = world.config().thrust;
    let left = world
        .spawn_agent(drifting(100.0, 100.0, 5.0, 0.0, thrust))
        .expect("left");
    let right = world
        .spawn_agent(drifting(118.0, 100.0, -5.0, 0.0, thrust))
        .expect("right");

    let events = world.step();
    assert_eq!(events.collisions, 1);
    assert_eq!(events.contacts[0].agent, left);
    assert_eq!(events.contacts[0].other, right);

    let left = world.agent(left).expect("left");
    let right = world.agent(right).expect("right");
    assert!((left.velocity().x + 5.0).abs() < 1e-9);
    assert!((right.velocity().x - 5.0).abs() < 1e-9);
    let gap = (right.position() - left.position()).length();
    assert!(gap >= 20.0, "separation {gap} below contact distance");
    world.validate_index().expect("fresh index");
}

#[test]
fn positions_stay_in_bounds_and_index_stays_fresh() {
    let mut world = seeded_world(0x5EED, 80);
    let mut rng = SmallRng::seed_from_u64(99);
    let (width, height) = (world.config().world_width, world.config().world_height);
    let handles: Vec<AgentId> = world.agents().iter_handles().collect();

    for round in 0..20 {
        scripted_run(&mut world, &mut rng, 30, 10);
        for (_, agent) in world.agents().iter() {
            let p = agent.position();
            assert!((0.0..=width).contains(&p.x), "x out of bounds: {p:?}");
            assert!((0.0..=height).contains(&p.y), "y out of bounds: {p:?}");
        }
        if round % 5 == 4 {
            world.validate_index().expect("fresh index");
            for &id in &handles {
                assert_eq!(world.index().memberships(id), [1; 4]);
            }
        }
    }
    assert_eq!(world.tick(), Tick(600));
}

#[test]
fn wall_contact_reflects_outgoing_component() {
    let mut world = WorldState::new(SwarmConfig::default()).expect("world");
    let thrust = world.config().thrust;
    let id = world
        .spawn_agent(drifting(799.5, 300.0, 120.0, 30.0, thrust))
        .expect("spawn");
    world.step();
    let agent = world.agent(id).expect("agent");
    assert_eq!(agent.position().x, 800.0);
    assert!(agent.velocity().x < 0.0);
    assert!(agent.velocity().y > 0.0);
}

fn converge(start: Position, target: Position) {
    let config = SwarmConfig {
        world_width: 1_200.0,
        world_height: 600.0,
        ..SwarmConfig::default()
    };
    let mut world = WorldState::new(config).expect("world");
    let id = world
        .spawn_agent(AgentData::at_rest(start, target))
        .expect("spawn");
    world.select(id).expect("select");

    let path = target - start;
    let length = path.length();
    let heading = path * (1.0 / length);
    let dt = world.config().timestep;
    let mut overshoot: f64 = 0.0;
    let mut top_speed: f64 = 0.0;
    let mut arrived_at = None;

    for tick in 0..2_000 {
        let events = world.step();
        let agent = world.agent(id).expect("agent");
        top_speed = top_speed.max(agent.speed());
        overshoot = overshoot.max((agent.position() - start).dot(heading) - length);
        if events.arrivals == 1 {
            arrived_at = Some(tick);
            break;
        }
    }

    let tick = arrived_at.expect("agent never arrived");
    let agent = world.agent(id).expect("agent");
    assert!(tick > 0);
    assert_eq!(agent.motion_state(), MotionState::Idle);
    assert!(!agent.has_target());
    assert!((agent.position() - target).length() < world.config().arrival_radius);
    let allowance = top_speed * dt + world.config().arrival_radius;
    assert!(
        overshoot <= allowance,
        "overshoot {overshoot} exceeds {allowance}"
    );
}

#[test]
fn agent_converges_along_an_axis() {
    converge(Position::new(100.0, 300.0), Position::new(500.0, 300.0));
}

#[test]
fn agent_converges_along_a_diagonal() {
    converge(Position::new(100.0, 100.0), Position::new(400.0, 400.0));
    converge(Position::new(1_100.0, 500.0), Position::new(200.0, 80.0));
}

#[test]
fn identical_seeds_produce_identical_histories() {
    let run = |seed: u64| -> (Vec<TickSummary>, Vec<Position>) {
        let mut world = seeded_world(seed, 60);
        let mut rng = SmallRng::seed_from_u64(seed ^ 0xABCD);
        scripted_run(&mut world, &mut rng, 240, 20);
        (
            world.history().cloned().collect(),
            world.agents().iter().map(|(_, a)| a.position()).collect(),
        )
    };
    let (history_a, positions_a) = run(42);
    let (history_b, positions_b) = run(42);
    assert_eq!(history_a, history_b);
    assert_eq!(positions_a, positions_b);
    assert!(history_a.iter().any(|summary| summary.moving > 0));
}

#[test]
fn departed_agent_leaves_its_old_neighbourhood() {
    let mut world = WorldState::new(SwarmConfig::default()).expect("world");
    let id = world
        .spawn_agent(AgentData::at_rest(
            Position::new(50.0, 50.0),
            Position::new(750.0, 550.0),
        ))
        .expect("spawn");
    assert!(world.query_near(Position::new(50.0, 50.0)).contains(&id));
    world.select(id).expect("select");
    for _ in 0..240 {
        world.step();
    }
    let position = world.agent(id).expect("agent").position();
    assert!(position.x > 350.0, "agent barely moved: {position:?}");
    assert!(!world.query_near(Position::new(50.0, 50.0)).contains(&id));
    assert!(world.query_near(position).contains(&id));
    world.validate_index().expect("fresh index");
}

fn contact_partner(policy: ContactPolicy) -> (AgentId, AgentId, AgentId) {
    let config = SwarmConfig {
        contact_policy: policy,
        ..SwarmConfig::default()
    };
    let mut world = WorldState::new(config).expect("world");
    let thrust = world.config().thrust;
    let mover = world
        .spawn_agent(drifting(200.0, 200.0, 3.0, 0.0, thrust))
        .expect("mover");
    let ahead = world
        .spawn_agent(AgentData::at_rest(
            Position::new(219.0, 200.0),
            Position::default(),
        ))
        .expect("ahead");
    let beside = world
        .spawn_agent(AgentData::at_rest(
            Position::new(200.0, 212.0),
            Position::default(),
        ))
        .expect("beside");
    let events = world.step();
    assert_eq!(events.contacts[0].agent, mover);
    (events.contacts[0].other, ahead, beside)
}

#[test]
fn nearest_policy_picks_closest_overlap() {
    let (partner, _, beside) = contact_partner(ContactPolicy::Nearest);
    assert_eq!(partner, beside);
}

#[test]
fn first_found_policy_picks_lowest_handle() {
    let (partner, ahead, _) = contact_partner(ContactPolicy::FirstFound);
    assert_eq!(partner, ahead);
}

#[test]
fn struck_resting_agent_drifts_to_a_stop() {
    let mut world = WorldState::new(SwarmConfig::default()).expect("world");
    let thrust = world.config().thrust;
    world
        .spawn_agent(drifting(300.0, 300.0, 60.0, 0.0, thrust))
        .expect("striker");
    let struck = world
        .spawn_agent(AgentData::at_rest(
            Position::new(319.5, 300.0),
            Position::default(),
        ))
        .expect("struck");

    world.step();
    let agent = world.agent(struck).expect("struck");
    assert_eq!(agent.motion_state(), MotionState::Drifting);
    assert!(agent.velocity().x > 0.0);

    for _ in 0..600 {
        world.step();
    }
    let agent = world.agent(struck).expect("struck");
    assert_eq!(agent.motion_state(), MotionState::Idle);
    assert_eq!(agent.velocity(), Vec2::ZERO);
}

#[test]
fn host_picks_selects_and_highlights() {
    let mut world = seeded_world(7, 40);
    let (id, position) = world
        .agents()
        .iter()
        .map(|(id, agent)| (id, agent.position()))
        .next()
        .expect("populated");

    let picked = world
        .pick_at(position + Vec2::new(1.0, 1.0))
        .expect("agent under cursor");
    apply_host_command(&mut world, HostCommand::Select { agent: picked }).expect("select");
    assert_eq!(world.selected(), Some(picked));
    assert!(world.agent(picked).is_some_and(|agent| agent.has_target()));

    let near = world.highlight_near(position);
    assert!(near >= 1);
    assert!(world.agent(id).is_some_and(|agent| agent.is_near()));
    assert!(world.highlighted().contains(&id));
}

fn wall_pinned_contact(striker_first: bool) -> f64 {
    let mut world = WorldState::new(SwarmConfig::default()).expect("world");
    let thrust = world.config().thrust;
    let striker_data = drifting(5.0, 300.0, -60.0, 0.0, thrust);
    let resting_data = AgentData::at_rest(Position::new(15.0, 300.0), Position::default());
    let (striker, resting) = if striker_first {
        let striker = world.spawn_agent(striker_data).expect("striker");
        (striker, world.spawn_agent(resting_data).expect("resting"))
    } else {
        let resting = world.spawn_agent(resting_data).expect("resting");
        (world.spawn_agent(striker_data).expect("striker"), resting)
    };

    let events = world.step();
    assert!(events.collisions >= 1);
    assert_eq!(events.index_failures, 0);
    world.validate_index().expect("fresh index");
    let striker = world.agent(striker).expect("striker").position();
    let resting = world.agent(resting).expect("resting").position();
    assert!(striker.x >= 0.0 && resting.x >= 0.0);
    (resting - striker).length()
}

#[test]
fn contact_against_a_wall_pushes_the_partner_clear() {
    for striker_first in [true, false] {
        let gap = wall_pinned_contact(striker_first);
        assert!(
            gap >= 20.0,
            "pair still overlapping (striker first: {striker_first}): gap {gap}"
        );
    }
}

#[test]
fn agents_exactly_touching_count_as_contact() {
    let mut world = WorldState::new(SwarmConfig::default()).expect("world");
    let thrust = world.config().thrust;
    // Lands on (101, 100) after one tick, exactly one contact distance from the resting agent.
    let mover = world
        .spawn_agent(drifting(100.0, 100.0, 60.0, 0.0, thrust))
        .expect("mover");
    let resting = world
        .spawn_agent(AgentData::at_rest(
            Position::new(121.0, 100.0),
            Position::default(),
        ))
        .expect("resting");

    let events = world.step();
    assert_eq!(events.collisions, 1);
    assert_eq!(events.contacts[0].agent, mover);
    assert_eq!(events.contacts[0].other, resting);
    let gap = (world.agent(resting).expect("resting").position()
        - world.agent(mover).expect("mover").position())
    .length();
    assert!(gap > 20.0, "touching pair not pushed clear: gap {gap}");
    assert!(world.agent(resting).expect("resting").velocity().x > 0.0);
}
