//! Guarded edges between flow states.
//!
//! A [`Transition`] names a target state and owns a root [`Condition`]. It
//! can fire when its target is still registered for the controller and its
//! condition holds. The root defaults to an empty AND, so a transition with no
//! conditions is unconditional.
//!
//! Conditions usually accrue one at a time while a flow is authored.
//! [`Transition::add_condition`] keeps the root evaluable as a single
//! condition by appending to a composite root, or by wrapping a leaf root in
//! a new AND; the returned [`RootChange`] says which happened.
//! [`TransitionBuilder`] offers the same operations in builder form.

use serde::{Deserialize, Serialize};

use crate::components::condition::{CompositeMode, Condition, ConditionKind};
use crate::components::flowstate::StateType;
use crate::components::parameters::ParameterContext;
use crate::resources::stateregistry::RegistryView;

/// What [`Transition::add_condition`] did to the root condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootChange {
    /// The root was already a composite; the condition became its last child.
    Appended,
    /// The root was a leaf; a new AND now wraps the old root and the condition.
    Wrapped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Id of the state this transition leads to.
    pub target: String,
    /// Advisory type of the target state, for tooling.
    pub target_type: Option<StateType>,
    pub condition: Condition,
}

impl Transition {
    /// Unconditional transition to `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            target_type: None,
            condition: Condition::always(),
        }
    }

    pub fn with_condition(target: impl Into<String>, condition: Condition) -> Self {
        Self {
            target: target.into(),
            target_type: None,
            condition,
        }
    }

    /// True when the target is registered and the condition holds.
    ///
    /// The registry lookup runs first; a dormant target skips evaluation.
    pub fn can_transition(&self, ctx: &ParameterContext, registry: RegistryView<'_>) -> bool {
        registry.contains(&self.target) && self.condition.evaluate(ctx)
    }

    pub fn add_condition(&mut self, condition: Condition) -> RootChange {
        match self.condition.push_child(condition) {
            Ok(()) => RootChange::Appended,
            Err(condition) => {
                let previous = std::mem::take(&mut self.condition);
                self.condition = Condition::all(vec![previous, condition]);
                RootChange::Wrapped
            }
        }
    }

    /// Attach a new empty AND group and return it for population.
    pub fn add_and_group(&mut self) -> &mut Condition {
        self.add_group(CompositeMode::And)
    }

    /// Attach a new empty OR group and return it for population.
    pub fn add_or_group(&mut self) -> &mut Condition {
        self.add_group(CompositeMode::Or)
    }

    fn add_group(&mut self, mode: CompositeMode) -> &mut Condition {
        if !self.condition.is_composite() {
            let previous = std::mem::take(&mut self.condition);
            self.condition = Condition::all(vec![previous]);
        }
        match &mut self.condition.kind {
            ConditionKind::Composite { children, .. } => {
                children.push(Condition::composite(mode, Vec::new()));
                let last = children.len() - 1;
                &mut children[last]
            }
            _ => unreachable!("root is wrapped in a composite above"),
        }
    }

    /// Deep copy with fresh condition identities.
    pub fn duplicate(&self) -> Transition {
        Transition {
            target: self.target.clone(),
            target_type: self.target_type,
            condition: self.condition.duplicate(),
        }
    }
}

/// Builder for a [`Transition`] whose root grows condition by condition.
///
/// ```ignore
/// let land = TransitionBuilder::to("land")
///     .and(Condition::bool("Grounded", true))
///     .and(Condition::float("VerticalVelocity", CmpOp::Less, -0.5))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TransitionBuilder {
    transition: Transition,
}

impl TransitionBuilder {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            transition: Transition::new(target),
        }
    }

    pub fn target_type(mut self, state_type: StateType) -> Self {
        self.transition.target_type = Some(state_type);
        self
    }

    /// Replace the root condition.
    pub fn when(mut self, condition: Condition) -> Self {
        self.transition.condition = condition;
        self
    }

    /// Require `condition` in addition to everything added so far.
    pub fn and(mut self, condition: Condition) -> Self {
        self.transition.add_condition(condition);
        self
    }

    /// Require at least one of `conditions`.
    pub fn and_any(self, conditions: Vec<Condition>) -> Self {
        self.and(Condition::any(conditions))
    }

    /// Require all of `conditions` as a nested group.
    pub fn and_all(self, conditions: Vec<Condition>) -> Self {
        self.and(Condition::all(conditions))
    }

    pub fn build(self) -> Transition {
        self.transition
    }
}
