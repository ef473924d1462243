//! Animation states of a flow.
//!
//! A [`FlowState`] is one animation unit: an id, the animation it plays, its
//! playback policy and the ordered list of transitions leaving it. The three
//! [`StateKind`] variants only differ in how playback starts and ends:
//!
//! - `Looping` – plays with looping enabled, forever
//! - `OneTime` – plays once, so completion can be observed through the
//!   animation-finished parameter
//! - `HoldFrame` – plays once and pins a single frame, for static poses
//!
//! Transition checks are identical for every kind: transitions are tried in
//! declaration order and the first one that can fire wins.

use std::fmt;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::components::parameters::ParameterContext;
use crate::components::transition::Transition;
use crate::error::FlowError;
use crate::resources::stateregistry::RegistryView;

/// Kind of a state without its payload, as written in flow descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateType {
    OneTime,
    Looping,
    HoldFrame,
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateType::OneTime => "OneTime",
            StateType::Looping => "Looping",
            StateType::HoldFrame => "HoldFrame",
        };
        f.write_str(name)
    }
}

/// Playback policy of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    OneTime,
    Looping,
    HoldFrame { frame: usize },
}

impl StateKind {
    pub fn state_type(&self) -> StateType {
        match self {
            StateKind::OneTime => StateType::OneTime,
            StateKind::Looping => StateType::Looping,
            StateKind::HoldFrame { .. } => StateType::HoldFrame,
        }
    }

    pub fn is_looping(&self) -> bool {
        matches!(self, StateKind::Looping)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pub id: String,
    pub animation: String,
    pub kind: StateKind,
    /// Outgoing transitions; order is the tie-break between matching ones.
    pub transitions: Vec<Transition>,
}

impl FlowState {
    pub fn new(id: impl Into<String>, animation: impl Into<String>, kind: StateKind) -> Self {
        Self {
            id: id.into(),
            animation: animation.into(),
            kind,
            transitions: Vec::new(),
        }
    }

    pub fn looping(id: impl Into<String>, animation: impl Into<String>) -> Self {
        Self::new(id, animation, StateKind::Looping)
    }

    pub fn one_time(id: impl Into<String>, animation: impl Into<String>) -> Self {
        Self::new(id, animation, StateKind::OneTime)
    }

    pub fn hold_frame(id: impl Into<String>, animation: impl Into<String>, frame: usize) -> Self {
        Self::new(id, animation, StateKind::HoldFrame { frame })
    }

    /// Append an outgoing transition (builder pattern).
    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn is_looping(&self) -> bool {
        self.kind.is_looping()
    }

    /// Start playback of this state's animation.
    pub fn on_enter(&self, ctx: &mut ParameterContext) {
        trace!("Entering state '{}' ({})", self.id, self.kind.state_type());
        let Some(animator) = ctx.animator_mut() else {
            return;
        };
        animator.play(&self.animation);
        animator.set_looping(self.is_looping());
        if let StateKind::HoldFrame { frame } = self.kind {
            animator.set_frame(frame);
        }
    }

    pub fn on_exit(&self, _ctx: &mut ParameterContext) {
        trace!("Exiting state '{}'", self.id);
    }

    /// Per-tick hook. A hold-frame state re-asserts its frame every tick.
    pub fn on_update(&self, ctx: &mut ParameterContext, _dt: f32) {
        if let StateKind::HoldFrame { frame } = self.kind {
            if let Some(animator) = ctx.animator_mut() {
                animator.set_frame(frame);
            }
        }
    }

    /// Id of the first transition, in declaration order, that can fire.
    pub fn check_transitions<'s>(
        &'s self,
        ctx: &ParameterContext,
        registry: RegistryView<'_>,
    ) -> Option<&'s str> {
        self.transitions
            .iter()
            .find(|transition| transition.can_transition(ctx, registry))
            .map(|transition| transition.target.as_str())
    }

    /// Check the authored state and every transition condition.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.id.is_empty() {
            return Err(FlowError::EmptyStateId {
                animation: self.animation.clone(),
            });
        }
        if self.animation.is_empty() {
            return Err(FlowError::EmptyAnimationName {
                state: self.id.clone(),
            });
        }
        for transition in &self.transitions {
            transition.condition.validate()?;
        }
        Ok(())
    }

    /// Deep copy with fresh condition identities.
    pub fn duplicate(&self) -> FlowState {
        FlowState {
            id: self.id.clone(),
            animation: self.animation.clone(),
            kind: self.kind,
            transitions: self.transitions.iter().map(Transition::duplicate).collect(),
        }
    }
}
