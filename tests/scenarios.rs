//! End-to-end enemy behaviour driven through the simulation

use std::sync::Arc;

use enemy_ai::prelude::*;

fn simulation() -> Simulation {
    let mesh: Arc<dyn NavMesh> = Arc::new(Grid::centered(200, 200, 1.0));
    Simulation::new(SimConfig::default(), mesh).unwrap()
}

fn position_of(sim: &Simulation, entity: hecs::Entity) -> Vec3 {
    sim.world().get::<Transform>(entity).unwrap().position
}

fn run_until(sim: &mut Simulation, entity: hecs::Entity, state: &str, max_ticks: usize) -> bool {
    for _ in 0..max_ticks {
        sim.tick();
        if sim.state_name(entity) == Some(state) {
            return true;
        }
    }
    false
}

#[test]
fn test_grunt_engagement_cycle() {
    let mut sim = simulation();
    let grunt = sim.spawn_grunt(Vec3::ZERO, 0.0).unwrap();

    // Behind the grunt: unseen
    sim.spawn_player(Vec3::new(0.0, 0.0, 50.0));
    for _ in 0..10 {
        sim.tick();
    }
    assert_eq!(sim.state_name(grunt), Some("Idle"));

    // In front but out of range: chase
    sim.set_player_position(Vec3::new(0.0, 0.0, -50.0)).unwrap();
    sim.tick();
    assert_eq!(sim.state_name(grunt), Some("Pursuing"));

    // Within range: strafe
    let here = position_of(&sim, grunt);
    sim.set_player_position(here + Vec3::new(0.0, 0.0, -10.0)).unwrap();
    sim.tick();
    assert_eq!(sim.state_name(grunt), Some("Strafing"));

    // Behind and far: lose sight, chase the last known position, give up
    let here = position_of(&sim, grunt);
    sim.set_player_position(here + Vec3::new(0.0, 0.0, 60.0)).unwrap();
    sim.tick();
    assert_eq!(sim.state_name(grunt), Some("Pursuing"));
    assert!(run_until(&mut sim, grunt, "Idle", 60 * 10));
}

#[test]
fn test_grunt_shoots_while_strafing() {
    let mut sim = simulation();
    let grunt = sim.spawn_grunt(Vec3::ZERO, 0.0).unwrap();
    sim.spawn_player(Vec3::new(0.0, 0.0, -10.0));

    let mut shots = 0;
    for _ in 0..(60 * 3) {
        sim.tick();
        shots += sim
            .events()
            .iter()
            .filter(|e| matches!(e, AiEvent::ShotFired { entity, .. } if *entity == grunt))
            .count();
    }

    assert_eq!(sim.state_name(grunt), Some("Strafing"));
    // One shot on the trigger pull, then one per second
    assert!((3..=4).contains(&shots), "fired {shots} shots");
}

#[test]
fn test_turret_engagement_timeout() {
    let mut sim = simulation();
    let turret = sim.spawn_turret(Vec3::ZERO, 0.0).unwrap();
    sim.spawn_player(Vec3::new(0.0, 0.0, -10.0));

    sim.tick();
    assert_eq!(sim.state_name(turret), Some("Attacking"));

    // Out of view: keep covering the last known position for 5s
    sim.set_player_position(Vec3::new(0.0, 0.0, 40.0)).unwrap();
    for _ in 0..(60 * 4) {
        sim.tick();
        assert_eq!(sim.state_name(turret), Some("Attacking"));
    }
    assert!(run_until(&mut sim, turret, "Idle", 60 * 2));
}

#[test]
fn test_tank_backs_off() {
    let mut sim = simulation();
    let tank = sim.spawn_tank(Vec3::ZERO, 0.0).unwrap();
    let player = Vec3::new(0.0, 0.0, -8.0);
    sim.spawn_player(player);

    assert!(run_until(&mut sim, tank, "Distancing", 5));
    for _ in 0..(60 * 4) {
        sim.tick();
    }

    assert_eq!(sim.state_name(tank), Some("Distancing"));
    let distance = position_of(&sim, tank).distance(player);
    assert!(distance > 12.0, "tank only reached {distance}");
}

#[test]
fn test_tank_searches_after_losing_sight() {
    let mut sim = simulation();
    let tank = sim.spawn_tank(Vec3::ZERO, 0.0).unwrap();
    sim.spawn_player(Vec3::new(0.0, 0.0, -15.0));
    assert!(run_until(&mut sim, tank, "Distancing", 5));

    sim.despawn_player();
    sim.tick();
    assert_eq!(sim.state_name(tank), Some("Searching"));
    assert!(run_until(&mut sim, tank, "Idle", 60 * 10));
}

fn split_simulation() -> Simulation {
    // A wall across the whole arena leaves two disconnected halves
    let mut grid = Grid::centered(40, 40, 1.0);
    grid.block_area(Vec3::new(-20.0, 0.0, 4.0), Vec3::new(20.0, 0.0, 6.0));
    Simulation::new(SimConfig::default(), Arc::new(grid)).unwrap()
}

#[test]
fn test_unreachable_last_known_position_is_given_up() {
    let across = BulletHit {
        origin: Vec3::new(0.5, 0.0, 15.5),
        damage: 10.0,
    };

    let mut sim = split_simulation();
    let grunt = sim.spawn_grunt(Vec3::new(0.5, 0.0, 0.5), 0.0).unwrap();
    // Off to the side, never inside the view cone
    sim.spawn_player(Vec3::new(15.5, 0.0, 0.5));
    sim.bullet_hit(grunt, across).unwrap();
    assert_eq!(sim.state_name(grunt), Some("Pursuing"));
    assert!(run_until(&mut sim, grunt, "Idle", 60 * 10));
    assert!(position_of(&sim, grunt).z < 4.0);

    let mut sim = split_simulation();
    let tank = sim.spawn_tank(Vec3::new(0.5, 0.0, 0.5), 0.0).unwrap();
    sim.spawn_player(Vec3::new(15.5, 0.0, 0.5));
    sim.bullet_hit(tank, across).unwrap();
    assert_eq!(sim.state_name(tank), Some("Searching"));
    assert!(run_until(&mut sim, tank, "Idle", 60 * 10));
}

#[test]
fn test_explosion_kills_and_publishes_death() {
    let mut sim = simulation();
    let grunt = sim.spawn_grunt(Vec3::new(1.0, 0.0, 0.0), 0.0).unwrap();
    let turret = sim.spawn_turret(Vec3::new(10.0, 0.0, 0.0), 0.0).unwrap();

    let outcomes = sim.explode(Vec3::ZERO, 5.0, 200.0);
    assert_eq!(outcomes, vec![(grunt, HitOutcome::Killed)]);

    sim.tick();
    let died: Vec<_> = sim
        .events()
        .iter()
        .filter_map(|e| match e {
            AiEvent::Died { entity, .. } => Some(*entity),
            _ => None,
        })
        .collect();
    assert_eq!(died, vec![grunt]);
    assert_eq!(sim.state_name(grunt), None);
    assert_eq!(sim.state_name(turret), Some("Idle"));
}

#[test]
fn test_same_seed_same_run() {
    let record = || {
        let mut sim = simulation();
        sim.spawn_grunt(Vec3::new(-5.0, 0.0, 0.0), 0.0).unwrap();
        sim.spawn_tank(Vec3::new(5.0, 0.0, 0.0), 0.0).unwrap();
        sim.spawn_turret(Vec3::new(0.0, 0.0, 5.0), 0.0).unwrap();
        sim.spawn_player(Vec3::new(0.0, 0.0, -12.0));

        let mut events = Vec::new();
        for _ in 0..(60 * 5) {
            sim.tick();
            events.extend(sim.events().iter().cloned());
        }
        events
    };

    let first = record();
    assert!(!first.is_empty());
    assert_eq!(first, record());
}
