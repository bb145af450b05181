//! Property tests for contact resolution and wall containment.

use proptest::prelude::*;
use swarmgrid_core::collision::separation_offset;
use swarmgrid_core::{
    AgentData, Position, SwarmConfig, Vec2, WorldState, kinetic_energy, resolve_elastic,
};

fn vec_strategy(limit: f64) -> impl Strategy<Value = Vec2> {
    (-limit..limit, -limit..limit).prop_map(|(x, y)| Vec2::new(x, y))
}

proptest! {
    #[test]
    fn resolution_is_symmetric(
        p1 in vec_strategy(500.0),
        p2 in vec_strategy(500.0),
        v1 in vec_strategy(300.0),
        v2 in vec_strategy(300.0),
    ) {
        prop_assume!((p1 - p2).length_squared() > 1e-6);
        let ab = resolve_elastic(p1, v1, p2, v2).expect("distinct centres");
        let ba = resolve_elastic(p2, v2, p1, v1).expect("distinct centres");
        prop_assert!((ab.first - ba.second).length() < 1e-9);
        prop_assert!((ab.second - ba.first).length() < 1e-9);
    }

    #[test]
    fn resolution_never_adds_energy(
        p1 in vec_strategy(500.0),
        p2 in vec_strategy(500.0),
        v1 in vec_strategy(300.0),
        v2 in vec_strategy(300.0),
    ) {
        prop_assume!((p1 - p2).length_squared() > 1e-6);
        let out = resolve_elastic(p1, v1, p2, v2).expect("distinct centres");
        let before = kinetic_energy([v1, v2]);
        let after = kinetic_energy([out.first, out.second]);
        prop_assert!(after <= before + 1e-9 * (1.0 + before), "{before} -> {after}");
    }

    #[test]
    fn separation_clears_contact_distance(
        other in vec_strategy(500.0),
        angle in 0.0..std::f64::consts::TAU,
        gap in 0.01f64..19.99,
    ) {
        let mover = other + Vec2::new(angle.cos(), angle.sin()) * gap;
        let offset = separation_offset(mover, other, 20.0, 0.1).expect("overlapping pair");
        let after = (mover + offset - other).length();
        prop_assert!(after >= 20.0, "separation {after}");
    }

    #[test]
    fn drifting_agents_stay_inside_the_world(
        x in 0.0f64..=800.0,
        y in 0.0f64..=600.0,
        velocity in vec_strategy(2_000.0),
        ticks in 1usize..240,
    ) {
        let mut world = WorldState::new(SwarmConfig::default()).expect("world");
        let thrust = world.config().thrust;
        let id = world
            .spawn_agent(AgentData {
                position: Position::new(x, y),
                velocity,
                acceleration: -thrust,
                target: Position::new(400.0, 300.0),
                has_target: false,
            })
            .expect("spawn");
        for _ in 0..ticks {
            world.step();
            let p = world.agent(id).expect("agent").position();
            prop_assert!((0.0..=800.0).contains(&p.x), "x escaped: {p:?}");
            prop_assert!((0.0..=600.0).contains(&p.y), "y escaped: {p:?}");
        }
        prop_assert!(world.validate_index().is_ok());
    }
}
