//! ECS resources made available to systems.
//!
//! Overview
//! - `animationstore` – clip definitions played by the sprite animator
//! - `debugmode` – presence enables per-tick flow diagnostics
//! - `flowconfig` – reserved parameter names and simulation settings from INI
//! - `stateregistry` – owner-scoped registry of every controller's states
//! - `worldtime` – simulation time and delta
pub mod animationstore;
pub mod debugmode;
pub mod flowconfig;
pub mod stateregistry;
pub mod worldtime;
