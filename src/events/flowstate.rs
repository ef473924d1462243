//! Flow state change event.
//!
//! This module defines [`FlowStateChanged`], which is triggered whenever the
//! [`FlowController`](crate::components::flowcontroller::FlowController) of an
//! entity enters a new state during a tick.
//!
//! # Usage
//!
//! ```ignore
//! fn on_state_change(trigger: On<FlowStateChanged>) {
//!     let event = trigger.event();
//!     println!("{:?}: {:?} -> {}", event.entity, event.from, event.to);
//! }
//!
//! world.add_observer(on_state_change);
//! ```

use bevy_ecs::prelude::*;

/// Event emitted when an entity's flow changes state.
///
/// Triggered by [`flow_controller_system`](crate::systems::flow::flow_controller_system)
/// after the new state's enter hook has run.
#[derive(Event, Debug, Clone)]
pub struct FlowStateChanged {
    /// The entity owning the controller.
    pub entity: Entity,
    pub from: Option<String>,
    pub to: String,
}
