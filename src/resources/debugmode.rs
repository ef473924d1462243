//! Debug toggle resource.
//!
//! The mere presence of this resource makes the flow system log, for every
//! controller and tick, the active state and the transition that would fire
//! next. Remove it to disable the diagnostics.

use bevy_ecs::prelude::Resource;

/// Marker resource: when present, systems print extra diagnostics.
#[derive(Resource, Debug, Clone, Copy)]
pub struct DebugMode {}
