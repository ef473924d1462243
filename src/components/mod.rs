//! ECS components and the value types they are built from.
//!
//! Submodules overview:
//! - [`parameters`] – typed parameter values and the per-controller parameter context
//! - [`condition`] – boolean condition trees evaluated against a parameter context
//! - [`transition`] – guarded edges between states
//! - [`flowstate`] – animation states and their playback policies
//! - [`flowcontroller`] – the per-entity component that drives a flow each tick

pub mod condition;
pub mod flowcontroller;
pub mod flowstate;
pub mod parameters;
pub mod transition;
