//! `animflow` command line entry point.
//!
//! Loads a flow description, validates it and, unless `--validate` is given,
//! simulates it in a `bevy_ecs` world with a sprite animator built from the
//! description's clips:
//!
//! 1. Load the INI configuration (defaults when the file is missing)
//! 2. Load and validate the JSON flow description
//! 3. Spawn one flow controller and apply `--set` parameters
//! 4. Run the fixed-step loop, applying `--at` parameters before their tick
//!    and logging every state change
//! 5. Print the final state
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- demos/locomotion.json --set Speed=0 --at 30:Speed=2.5
//! ```

use std::path::PathBuf;

use animflow::animator::SpriteAnimator;
use animflow::components::flowcontroller::FlowController;
use animflow::components::parameters::ParamValue;
use animflow::error::FlowError;
use animflow::events::flowstate::FlowStateChanged;
use animflow::flowdata::FlowDescription;
use animflow::resources::debugmode::DebugMode;
use animflow::resources::flowconfig::FlowConfig;
use animflow::resources::stateregistry::StateRegistry;
use animflow::resources::worldtime::WorldTime;
use animflow::systems::flow::{flow_controller_system, spawn_flow_controller};
use animflow::systems::time::update_world_time;
use bevy_ecs::observer::On;
use bevy_ecs::prelude::*;
use clap::Parser;
use log::{error, info, warn};

/// Validate and simulate animation flow descriptions.
#[derive(Parser)]
#[command(version, about = "Validate and simulate animation flow descriptions")]
struct Cli {
    /// Flow description (JSON).
    #[arg(value_name = "FLOW.json")]
    flow: PathBuf,

    /// INI configuration file (default: ./animflow.ini).
    #[arg(long, value_name = "INI")]
    config: Option<PathBuf>,

    /// Only validate the description and exit.
    #[arg(long)]
    validate: bool,

    /// Number of ticks to simulate; overrides the configuration.
    #[arg(long, value_name = "N")]
    ticks: Option<u32>,

    /// Tick delta in seconds; overrides the configuration.
    #[arg(long, value_name = "S")]
    delta: Option<f32>,

    /// Set a parameter before the first tick.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    set: Vec<Assignment>,

    /// Set a parameter right before the given tick (1-based).
    #[arg(long = "at", value_name = "TICK:NAME=VALUE", value_parser = parse_scheduled)]
    at: Vec<ScheduledAssignment>,

    /// Log the active state and pending transition every tick.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone)]
struct Assignment {
    name: String,
    value: ParamValue,
}

#[derive(Debug, Clone)]
struct ScheduledAssignment {
    tick: u32,
    assignment: Assignment,
}

/// Parse `NAME=VALUE`. The value is read as a JSON scalar when possible
/// (`true`, `3`, `0.5`) and as a plain string otherwise.
fn parse_assignment(raw: &str) -> Result<Assignment, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }
    let value = value.trim();
    let value = serde_json::from_str::<ParamValue>(value)
        .unwrap_or_else(|_| ParamValue::Str(value.to_string()));
    Ok(Assignment {
        name: name.to_string(),
        value,
    })
}

fn parse_scheduled(raw: &str) -> Result<ScheduledAssignment, String> {
    let (tick, assignment) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected TICK:NAME=VALUE, got '{}'", raw))?;
    let tick = tick
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid tick '{}': {}", tick, e))?;
    Ok(ScheduledAssignment {
        tick,
        assignment: parse_assignment(assignment)?,
    })
}

fn log_state_change(trigger: On<FlowStateChanged>, time: Res<WorldTime>) {
    let event = trigger.event();
    info!(
        "tick {}: {:?} {} -> {}",
        time.frame_count,
        event.entity,
        event.from.as_deref().unwrap_or("<none>"),
        event.to
    );
}

fn apply(world: &mut World, entity: Entity, assignment: &Assignment) {
    if let Some(mut controller) = world.get_mut::<FlowController>(entity) {
        controller.set_parameter(assignment.name.clone(), assignment.value.clone());
    }
}

fn run(cli: Cli) -> Result<(), FlowError> {
    let mut config = match &cli.config {
        Some(path) => FlowConfig::with_path(path),
        None => FlowConfig::new(),
    };
    if let Err(e) = config.load_from_file() {
        if cli.config.is_some() {
            warn!("{}; using defaults", e);
        }
    }

    let description = FlowDescription::load_from_file(&cli.flow)?;
    description.validate()?;
    info!("Flow {:?} is valid", cli.flow);
    if cli.validate {
        println!("{}: ok", cli.flow.display());
        return Ok(());
    }

    let ticks = cli.ticks.unwrap_or(config.ticks);
    let delta = cli.delta.unwrap_or(config.delta);
    let animator = SpriteAnimator::from_store(&description.animation_store(&config));

    // --------------- ECS world + resources ---------------
    let mut world = World::new();
    world.insert_resource(WorldTime::default());
    world.insert_resource(StateRegistry::new());
    world.insert_resource(config);
    if cli.debug {
        world.insert_resource(DebugMode {});
    }
    world.add_observer(log_state_change);
    world.flush();

    let entity = spawn_flow_controller(&mut world, Some(Box::new(animator)), Some(&description))?;
    for assignment in &cli.set {
        apply(&mut world, entity, assignment);
    }

    let mut update = Schedule::default();
    update.add_systems(flow_controller_system);

    // --------------- Main loop ---------------
    for tick in 1..=ticks {
        for scheduled in cli.at.iter().filter(|scheduled| scheduled.tick == tick) {
            apply(&mut world, entity, &scheduled.assignment);
        }
        update_world_time(&mut world, delta);
        update.run(&mut world);
    }

    let elapsed = world.resource::<WorldTime>().elapsed;
    if let Some(controller) = world.get::<FlowController>(entity) {
        println!(
            "after {} ticks ({:.3}s): state {}, previous {}, {:.3}s in state",
            ticks,
            elapsed,
            controller.current_state_id().unwrap_or("<none>"),
            controller.previous_state_id().unwrap_or("<none>"),
            controller.time_in_state()
        );
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment_reads_json_scalars() {
        let speed = parse_assignment("Speed=2.5").unwrap();
        assert_eq!(speed.name, "Speed");
        assert_eq!(speed.value, ParamValue::Float(2.5));
        assert_eq!(parse_assignment("Lives= 3").unwrap().value, ParamValue::Int(3));
        assert_eq!(parse_assignment("Grounded=true").unwrap().value, ParamValue::Bool(true));
    }

    #[test]
    fn test_parse_assignment_trims_string_values() {
        let surface = parse_assignment("Surface= ice ").unwrap();
        assert_eq!(surface.name, "Surface");
        assert_eq!(surface.value, ParamValue::Str("ice".to_string()));
    }

    #[test]
    fn test_parse_assignment_rejects_malformed_input() {
        assert!(parse_assignment("Speed").is_err());
        assert!(parse_assignment(" =1").is_err());
    }

    #[test]
    fn test_parse_scheduled() {
        let scheduled = parse_scheduled("30:Speed=0").unwrap();
        assert_eq!(scheduled.tick, 30);
        assert_eq!(scheduled.assignment.value, ParamValue::Int(0));
        assert!(parse_scheduled("soon:Speed=0").is_err());
    }
}
