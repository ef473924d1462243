//! Animation flow library.
//!
//! A data-driven animation state machine: flows are authored as JSON
//! descriptions of states and condition-guarded transitions, built into an
//! owner-scoped [`StateRegistry`](resources::stateregistry::StateRegistry),
//! and driven each tick by a [`FlowController`](components::flowcontroller::FlowController)
//! that evaluates runtime parameters and tells an [`Animator`](animator::Animator)
//! what to play.

pub mod animator;
pub mod components;
pub mod error;
pub mod events;
pub mod flowdata;
pub mod resources;
pub mod systems;
