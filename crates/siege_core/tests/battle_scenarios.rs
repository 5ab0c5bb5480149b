//! End-to-end scenarios driving the full simulation: siege and breach,
//! formation marches, fog of war over a campaign, and lockstep
//! determinism.

use siege_core::entity::{EntityBlueprint, EntityState};
use siege_core::events::GameEvent;
use siege_core::formation::FormationType;
use siege_core::math::{Fixed, Vec2Fixed};
use siege_test_utils::determinism::run_parallel_simulations;
use siege_test_utils::fixtures::{battlefield, fixed, fixed_f, spawn_company};

#[test]
fn ram_breaches_wall_and_opens_the_tile() {
    let mut sim = battlefield(32);
    let wall_pos = sim.terrain.grid_to_world(10, 10);
    let wall = sim.spawn(0, &EntityBlueprint::wall(), wall_pos).unwrap();
    let ram = sim
        .spawn(1, &EntityBlueprint::ram(), Vec2Fixed::new(fixed(200), fixed(336)))
        .unwrap();

    assert!(!sim.can_traverse(10, 10, 1));
    assert!(sim.order_attack(ram, wall));

    let mut events = Vec::new();
    for _ in 0..300 {
        sim.update(fixed_f(0.5));
        events.extend(sim.drain_events());
        if events
            .iter()
            .any(|e| matches!(e, GameEvent::WallBreached { .. }))
        {
            break;
        }
    }

    assert!(events.contains(&GameEvent::WallBreached { entity: wall }));
    assert!(
        !events.iter().any(|e| matches!(e, GameEvent::Died { entity } if *entity == wall)),
        "walls breach, they do not die"
    );

    let segment = sim.entities.get(wall).expect("breached wall persists");
    assert!(segment.active);
    assert!(segment.is_breached());
    assert!(sim.can_traverse(10, 10, 0));
    assert!(sim.can_traverse(10, 10, 1));

    // The ram disengages once the barrier is down.
    sim.update(fixed_f(0.5));
    assert_eq!(sim.entities.get(ram).unwrap().state, EntityState::Idle);
}

#[test]
fn formation_marches_to_destination_and_halts() {
    let mut sim = battlefield(32);
    let soldiers = spawn_company(
        &mut sim,
        0,
        &EntityBlueprint::militia(),
        &[(200, 200), (230, 200), (260, 200)],
    );
    let formation = sim
        .create_formation(FormationType::Line, 0, &soldiers)
        .unwrap();

    let target = Vec2Fixed::new(fixed(600), fixed(200));
    assert!(sim.move_formation(formation, target));
    assert!(sim.formations.get(formation).unwrap().moving);

    for _ in 0..300 {
        sim.update(fixed_f(0.1));
        if !sim.formations.get(formation).unwrap().moving {
            break;
        }
    }

    let arrived = sim.formations.get(formation).unwrap();
    assert!(!arrived.moving, "march must finish");
    assert!(
        arrived.position.distance(target) < fixed(64),
        "formation halted {} units from its destination",
        arrived.position.distance(target)
    );
    for member in &arrived.members {
        assert_eq!(sim.entities.get(member.id).unwrap().state, EntityState::Idle);
    }
}

#[test]
fn fog_of_war_trails_a_marching_scout() {
    let mut sim = battlefield(32);
    let start = sim.terrain.grid_to_world(3, 5);
    let scout = sim.spawn(0, &EntityBlueprint::villager(), start).unwrap();

    // Let the first recompute land before moving.
    sim.update(fixed_f(0.5));
    assert!(sim.is_visible(3, 5, 0));
    assert!(!sim.is_explored(25, 5, 0));
    assert!(!sim.is_explored(3, 5, 1), "fog is per-civilization");

    assert!(sim.move_entity(scout, sim.terrain.grid_to_world(25, 5)));
    for _ in 0..200 {
        sim.update(fixed_f(0.25));
        if sim.entities.get(scout).unwrap().state == EntityState::Idle {
            break;
        }
    }
    sim.update(fixed_f(0.5));

    // Left behind but remembered.
    assert!(!sim.is_visible(3, 5, 0));
    assert!(sim.is_explored(3, 5, 0));
    // Currently in sight at the destination.
    assert!(sim.is_visible(25, 5, 0));
}

#[test]
fn outnumbered_unit_falls_and_is_reaped() {
    let mut sim = battlefield(32);
    let attackers = spawn_company(
        &mut sim,
        0,
        &EntityBlueprint::militia(),
        &[(300, 280), (300, 320), (340, 300)],
    );
    let victim = spawn_company(&mut sim, 1, &EntityBlueprint::militia(), &[(320, 300)])[0];

    for &id in &attackers {
        assert!(sim.order_attack(id, victim));
    }

    let mut events = Vec::new();
    for _ in 0..200 {
        sim.update(fixed_f(0.1));
        events.extend(sim.drain_events());
        if !sim.entities.contains(victim) {
            break;
        }
    }

    assert!(events.contains(&GameEvent::Died { entity: victim }));
    assert!(!sim.entities.contains(victim), "corpse reaped after linger");
    for &id in &attackers {
        assert_eq!(sim.entities.get(id).unwrap().state, EntityState::Idle);
    }
}

#[test]
fn parallel_battles_stay_in_lockstep() {
    let hashes = run_parallel_simulations(
        || {
            let mut sim = battlefield(32);
            let red = spawn_company(
                &mut sim,
                0,
                &EntityBlueprint::militia(),
                &[(200, 200), (230, 200)],
            );
            let blue = spawn_company(
                &mut sim,
                1,
                &EntityBlueprint::archer(),
                &[(500, 200), (530, 200)],
            );
            sim.order_attack(red[0], blue[0]);
            sim.order_attack(red[1], blue[1]);
            sim.order_attack(blue[0], red[0]);
            sim.order_attack(blue[1], red[1]);
            sim
        },
        4,
        Fixed::lit("0.1"),
        100,
    );

    assert!(
        hashes.windows(2).all(|w| w[0] == w[1]),
        "parallel runs diverged: {hashes:?}"
    );
}
