//! Flow controller systems.
//!
//! - [`flow_controller_system`] – ticks every [`FlowController`] once per
//!   frame and emits [`FlowStateChanged`] for each state change
//! - [`spawn_flow_controller`] / [`despawn_flow_controller`] – create and
//!   remove controllers while keeping the shared [`StateRegistry`] in sync
//!
//! # Example Schedule Setup
//!
//! ```ignore
//! update_world_time(&mut world, dt);
//! let mut schedule = Schedule::default();
//! schedule.add_systems(flow_controller_system);
//! schedule.run(&mut world);
//! ```

use bevy_ecs::prelude::*;
use log::{debug, warn};

use crate::animator::Animator;
use crate::components::flowcontroller::FlowController;
use crate::error::FlowError;
use crate::events::flowstate::FlowStateChanged;
use crate::flowdata::FlowDescription;
use crate::resources::debugmode::DebugMode;
use crate::resources::flowconfig::FlowConfig;
use crate::resources::stateregistry::StateRegistry;
use crate::resources::worldtime::WorldTime;

/// Advance every flow controller by the current world delta.
///
/// When [`DebugMode`] is present, logs each controller's active state, time
/// in state and the transition that would fire on the next tick.
pub fn flow_controller_system(
    mut query: Query<(Entity, &mut FlowController)>,
    registry: Res<StateRegistry>,
    time: Res<WorldTime>,
    debug_mode: Option<Res<DebugMode>>,
    mut commands: Commands,
) {
    for (entity, mut controller) in query.iter_mut() {
        if let Some(change) = controller.tick(&registry, time.delta) {
            commands.trigger(FlowStateChanged {
                entity,
                from: change.from,
                to: change.to,
            });
        }

        if debug_mode.is_some() {
            debug!(
                "tick {} {:?} ({}): state {:?} for {:.3}s, pending {:?}",
                time.frame_count,
                entity,
                controller.owner(),
                controller.current_state_id(),
                controller.time_in_state(),
                controller.pending_transition(&registry)
            );
        }
    }
}

/// Spawn an entity carrying a controller built from `description`.
///
/// Reserved parameter names come from the [`FlowConfig`] resource when one is
/// present. The [`StateRegistry`] resource is created on first use.
pub fn spawn_flow_controller(
    world: &mut World,
    animator: Option<Box<dyn Animator>>,
    description: Option<&FlowDescription>,
) -> Result<Entity, FlowError> {
    let config = world.get_resource::<FlowConfig>().cloned().unwrap_or_default();
    if !world.contains_resource::<StateRegistry>() {
        world.insert_resource(StateRegistry::new());
    }

    let controller = {
        let mut registry = world.resource_mut::<StateRegistry>();
        let owner = registry.allocate_owner();
        let mut controller = FlowController::new(owner, animator)?.with_config(&config);
        controller.build(&mut registry, description)?;
        controller
    };

    Ok(world.spawn(controller).id())
}

/// Despawn `entity` and unregister the states of its controller.
///
/// Returns false when the entity does not exist.
pub fn despawn_flow_controller(world: &mut World, entity: Entity) -> bool {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        warn!("Cannot despawn missing flow entity {:?}", entity);
        return false;
    };
    let controller = entity_mut.take::<FlowController>();
    entity_mut.despawn();

    if let Some(mut controller) = controller {
        if let Some(mut registry) = world.get_resource_mut::<StateRegistry>() {
            controller.teardown(&mut registry);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::recording::RecordingAnimator;
    use crate::components::condition::Condition;
    use crate::components::flowstate::StateType;
    use crate::flowdata::{ConditionRecord, StateRecord, TransitionRecord};

    fn two_state_flow() -> FlowDescription {
        FlowDescription {
            states: vec![
                StateRecord::new("idle", StateType::Looping, "idle").initial(),
                StateRecord::new("walk", StateType::Looping, "walk"),
            ],
            transitions: vec![TransitionRecord::new(
                "idle",
                "walk",
                ConditionRecord::from_condition(&Condition::bool("Moving", true)),
            )],
            animations: Vec::new(),
        }
    }

    #[test]
    fn test_spawn_registers_states_and_enters_initial() {
        let mut world = World::new();
        let entity = spawn_flow_controller(
            &mut world,
            Some(Box::new(RecordingAnimator::new(&[]))),
            Some(&two_state_flow()),
        )
        .unwrap();

        let controller = world.get::<FlowController>(entity).unwrap();
        assert_eq!(controller.current_state_id(), Some("idle"));
        assert_eq!(
            world.resource::<StateRegistry>().len(controller.owner()),
            2
        );
    }

    #[test]
    fn test_spawn_without_animator_fails() {
        let mut world = World::new();
        let result = spawn_flow_controller(&mut world, None, Some(&two_state_flow()));
        assert!(matches!(result, Err(FlowError::MissingAnimator { .. })));
    }

    #[test]
    fn test_despawn_unregisters_states() {
        let mut world = World::new();
        let entity = spawn_flow_controller(
            &mut world,
            Some(Box::new(RecordingAnimator::new(&[]))),
            Some(&two_state_flow()),
        )
        .unwrap();

        assert!(despawn_flow_controller(&mut world, entity));
        assert!(world.resource::<StateRegistry>().is_empty());
        assert!(!despawn_flow_controller(&mut world, entity));
    }

    #[test]
    fn test_system_ticks_with_world_delta() {
        let mut world = World::new();
        world.insert_resource(WorldTime {
            delta: 0.25,
            ..Default::default()
        });
        let entity = spawn_flow_controller(
            &mut world,
            Some(Box::new(RecordingAnimator::new(&[]))),
            Some(&two_state_flow()),
        )
        .unwrap();

        let mut schedule = Schedule::default();
        schedule.add_systems(flow_controller_system);
        schedule.run(&mut world);

        let controller = world.get::<FlowController>(entity).unwrap();
        assert!((controller.time_in_state() - 0.25).abs() < 1e-6);
    }
}
