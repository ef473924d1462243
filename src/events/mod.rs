//! Event types emitted by the flow systems.
//!
//! Submodules:
//! - [`flowstate`] – state change notifications for flow controllers
pub mod flowstate;
