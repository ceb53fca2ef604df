//! Headless arena demonstrating the enemy AI
//!
//! Spawns one enemy of each type on a walled grid and walks a scripted player
//! around them, logging every state change, shot and death.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use enemy_ai::prelude::*;

/// Run the enemy AI arena without a renderer
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Tuning file (.ron or .json); defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of fixed steps to simulate
    #[arg(short, long, default_value_t = 1800)]
    ticks: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Scripted player path: a slow lap around the arena centre
struct PlayerScript {
    radius: f32,
    angular_speed: f32,
}

impl PlayerScript {
    fn position(&self, elapsed: f32) -> Vec3 {
        let angle = elapsed * self.angular_speed;
        Vec3::new(angle.cos() * self.radius, 0.0, angle.sin() * self.radius)
    }
}

fn arena_mesh() -> Grid {
    let mut grid = Grid::centered(80, 80, 1.0);
    // Central pillar
    grid.block_area(Vec3::new(-3.0, 0.0, -3.0), Vec3::new(3.0, 0.0, 3.0));
    grid
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    let mut sim = Simulation::new(config, Arc::new(arena_mesh()))?;
    sim.add_obstruction(Vec3::new(0.0, 1.5, 0.0), Vec3::new(3.0, 1.5, 3.0));

    let script = PlayerScript {
        radius: 18.0,
        angular_speed: 0.15,
    };
    sim.spawn_player(script.position(0.0));

    let grunt = sim.spawn_grunt(Vec3::new(-20.0, 0.0, -20.0), 0.0)?;
    let tank = sim.spawn_tank(Vec3::new(25.0, 0.0, 25.0), std::f32::consts::PI)?;
    let turret = sim.spawn_turret(Vec3::new(-25.0, 0.0, 25.0), 0.0)?;
    log::info!("arena ready: grunt {grunt:?}, tank {tank:?}, turret {turret:?}");

    let mut shots = 0usize;
    for _ in 0..args.ticks {
        let elapsed = sim.time().elapsed_seconds();
        sim.set_player_position(script.position(elapsed))?;
        sim.tick();

        for event in sim.events().iter() {
            match event {
                AiEvent::StateChanged { entity, from, to } => {
                    log::info!(
                        "t={elapsed:6.2} {entity:?}: {} -> {to}",
                        from.unwrap_or("-")
                    );
                }
                AiEvent::ShotFired { entity, shot } => {
                    shots += 1;
                    log::debug!("t={elapsed:6.2} {entity:?} fired at {:.1} m/s", shot.speed);
                }
                AiEvent::Died { entity, position } => {
                    log::info!("t={elapsed:6.2} {entity:?} died at {position}");
                }
                _ => {}
            }
        }
    }

    println!(
        "simulated {} ticks ({:.1}s): {} shots fired, {} enemies left",
        args.ticks,
        sim.time().elapsed_seconds(),
        shots,
        sim.enemy_count()
    );
    for (name, entity) in [("grunt", grunt), ("tank", tank), ("turret", turret)] {
        println!("  {name}: {}", sim.state_name(entity).unwrap_or("dead"));
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        eprintln!("Arena error: {}", e);
        std::process::exit(1);
    }
}
