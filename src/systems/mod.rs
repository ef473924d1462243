//! Simulation systems.
//!
//! Submodules overview
//! - [`flow`] – tick flow controllers and emit state change events
//! - [`time`] – update simulation time and delta

pub mod flow;
pub mod time;
