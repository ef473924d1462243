//! Flow controller component: the per-tick driver of an animation flow.
//!
//! A [`FlowController`] owns the [`ParameterContext`] of one animated entity
//! and the id of its active state. The states themselves live in the shared
//! [`StateRegistry`], registered under the controller's [`OwnerTag`].
//!
//! # Tick
//!
//! Each call to [`FlowController::tick`]:
//!
//! 1. Returns immediately when no state is active
//! 2. Advances the animator and writes the animation-finished parameter
//! 3. Adds the delta to the time spent in the active state and writes it to
//!    the time-in-state parameter
//! 4. Runs the active state's `on_update` hook
//! 5. Asks the active state for the first transition that can fire and, if
//!    its target is registered, exits the old state, resets the time counter
//!    and enters the new state
//!
//! A transition towards a state that is not registered is simply "no
//! transition this tick".
//!
//! # Example
//!
//! ```ignore
//! let mut registry = StateRegistry::new();
//! let owner = registry.allocate_owner();
//! let mut controller = FlowController::new(owner, Some(Box::new(animator)))?;
//! controller.build(&mut registry, Some(&description))?;
//! controller.set_parameter("Speed", 5.0);
//! controller.tick(&registry, 1.0 / 60.0);
//! ```
//!
//! # Related
//!
//! - [`crate::systems::flow::flow_controller_system`] – ticks every controller each frame
//! - [`crate::events::flowstate::FlowStateChanged`] – event emitted on state changes

use bevy_ecs::prelude::Component;
use log::{debug, info, warn};

use crate::animator::Animator;
use crate::components::flowstate::FlowState;
use crate::components::parameters::{FromParam, ParamValue, ParameterContext};
use crate::error::FlowError;
use crate::flowdata::FlowDescription;
use crate::resources::flowconfig::{
    DEFAULT_ANIMATION_FINISHED_PARAMETER, DEFAULT_TIME_IN_STATE_PARAMETER, FlowConfig,
};
use crate::resources::stateregistry::{OwnerTag, RegistryView, StateRegistry};

/// A state change performed by a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// State that was active before, if any.
    pub from: Option<String>,
    pub to: String,
}

#[derive(Component, Debug)]
pub struct FlowController {
    owner: OwnerTag,
    context: ParameterContext,
    current: Option<String>,
    previous: Option<String>,
    /// State entered when the flow was built.
    initial: Option<String>,
    time_in_state: f32,
    time_in_state_parameter: String,
    animation_finished_parameter: String,
}

impl FlowController {
    /// Create an idle controller playing through `animator`.
    ///
    /// Fails when no animator is supplied: without one no state can play.
    pub fn new(owner: OwnerTag, animator: Option<Box<dyn Animator>>) -> Result<Self, FlowError> {
        let Some(animator) = animator else {
            return Err(FlowError::MissingAnimator {
                owner: owner.to_string(),
            });
        };
        Ok(Self {
            owner,
            context: ParameterContext::with_animator(animator),
            current: None,
            previous: None,
            initial: None,
            time_in_state: 0.0,
            time_in_state_parameter: DEFAULT_TIME_IN_STATE_PARAMETER.to_string(),
            animation_finished_parameter: DEFAULT_ANIMATION_FINISHED_PARAMETER.to_string(),
        })
    }

    /// Use the reserved parameter names from `config`.
    pub fn with_config(mut self, config: &FlowConfig) -> Self {
        self.time_in_state_parameter = config.time_in_state_parameter.clone();
        self.animation_finished_parameter = config.animation_finished_parameter.clone();
        self
    }

    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    /// Build the runtime states from `description` and enter the initial one.
    ///
    /// Without a description the controller's previous states are dropped and
    /// it stays idle. The description is fully validated before anything is
    /// registered, so a failed build leaves the registry untouched.
    pub fn build(
        &mut self,
        registry: &mut StateRegistry,
        description: Option<&FlowDescription>,
    ) -> Result<(), FlowError> {
        match description {
            Some(description) => {
                let states = description.build_states()?;
                self.install_states(registry, states, description.initial_state())
            }
            None => {
                info!("{}: no flow description, controller stays idle", self.owner);
                self.teardown(registry);
                Ok(())
            }
        }
    }

    /// Like [`build`](Self::build), but installs the states returned by
    /// `default_states` when there is no description.
    pub fn build_or_else(
        &mut self,
        registry: &mut StateRegistry,
        description: Option<&FlowDescription>,
        default_states: impl FnOnce() -> Vec<FlowState>,
    ) -> Result<(), FlowError> {
        match description {
            Some(_) => self.build(registry, description),
            None => {
                info!("{}: no flow description, using default states", self.owner);
                self.install_states(registry, default_states(), None)
            }
        }
    }

    /// Replace this controller's states with `states` and enter the initial
    /// one: `initial` when it names a registered state, otherwise the first
    /// registered state.
    pub fn install_states(
        &mut self,
        registry: &mut StateRegistry,
        states: Vec<FlowState>,
        initial: Option<&str>,
    ) -> Result<(), FlowError> {
        for state in &states {
            state.validate()?;
        }

        self.teardown(registry);
        for state in states {
            registry.register(self.owner, state);
        }

        let view = registry.view(self.owner);
        let initial = match initial {
            Some(id) if view.contains(id) => Some(id.to_string()),
            Some(id) => {
                warn!(
                    "{}: initial state '{}' is not part of the flow, using the first state",
                    self.owner, id
                );
                registry.first_registered(self.owner).map(str::to_string)
            }
            None => registry.first_registered(self.owner).map(str::to_string),
        };

        info!(
            "{}: built {} states, initial {:?}",
            self.owner,
            registry.len(self.owner),
            initial
        );

        self.initial = initial.clone();
        if let Some(initial) = initial {
            self.change_state(view, &initial);
        }
        Ok(())
    }

    /// Exit the active state and unregister every state of this controller.
    pub fn teardown(&mut self, registry: &mut StateRegistry) {
        if let Some(current) = self.current.take() {
            if let Some(state) = registry.get(self.owner, &current) {
                state.on_exit(&mut self.context);
            }
            self.previous = Some(current);
        }
        self.time_in_state = 0.0;
        self.initial = None;
        registry.unregister_owner(self.owner);
    }

    /// Advance the flow by `dt` seconds. Returns the state change, if any.
    pub fn tick(&mut self, registry: &StateRegistry, dt: f32) -> Option<StateChange> {
        let view = registry.view(self.owner);
        let current = self.current.as_deref()?;
        let Some(state) = view.get(current) else {
            warn!(
                "{}: active state '{}' is no longer registered, controller goes idle",
                self.owner, current
            );
            self.previous = self.current.take();
            self.time_in_state = 0.0;
            return None;
        };

        if let Some(animator) = self.context.animator_mut() {
            animator.advance(dt);
        }
        self.write_animation_finished();

        self.time_in_state += dt;
        self.context
            .set_parameter(self.time_in_state_parameter.clone(), self.time_in_state);

        state.on_update(&mut self.context, dt);

        let next = state.check_transitions(&self.context, view)?.to_string();
        self.change_state(view, &next)
    }

    /// Enter `id` without checking any condition. Returns `None` and leaves
    /// the active state alone when `id` is not registered.
    pub fn force_transition(&mut self, registry: &StateRegistry, id: &str) -> Option<StateChange> {
        let change = self.change_state(registry.view(self.owner), id);
        if change.is_none() {
            warn!("{}: cannot force transition to unknown state '{}'", self.owner, id);
        }
        change
    }

    /// Target of the transition that would fire on the next tick if no
    /// parameter changed. Read-only; used for diagnostics.
    pub fn pending_transition(&self, registry: &StateRegistry) -> Option<String> {
        let view = registry.view(self.owner);
        let state = view.get(self.current.as_deref()?)?;
        state
            .check_transitions(&self.context, view)
            .map(str::to_string)
    }

    fn change_state(&mut self, view: RegistryView<'_>, next: &str) -> Option<StateChange> {
        let new_state = view.get(next)?;

        let from = self.current.take();
        if let Some(old_state) = from.as_deref().and_then(|id| view.get(id)) {
            old_state.on_exit(&mut self.context);
        }

        self.previous = from.clone();
        self.current = Some(next.to_string());
        self.time_in_state = 0.0;
        self.context
            .set_parameter(self.time_in_state_parameter.clone(), 0.0f32);

        new_state.on_enter(&mut self.context);
        self.write_animation_finished();

        debug!("{}: {:?} -> '{}'", self.owner, from, next);
        Some(StateChange {
            from,
            to: next.to_string(),
        })
    }

    fn write_animation_finished(&mut self) {
        let finished = self
            .context
            .animator()
            .map(|animator| animator.is_finished())
            .unwrap_or(false);
        self.context
            .set_parameter(self.animation_finished_parameter.clone(), finished);
    }

    pub fn current_state_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn previous_state_id(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn initial_state_id(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    /// Seconds spent in the active state.
    pub fn time_in_state(&self) -> f32 {
        self.time_in_state
    }

    pub fn has_state(&self, registry: &StateRegistry, id: &str) -> bool {
        registry.contains(self.owner, id)
    }

    /// Ids of this controller's states, in registration order.
    pub fn state_ids(&self, registry: &StateRegistry) -> Vec<String> {
        registry.state_ids(self.owner)
    }

    pub fn available_animations(&self) -> Vec<String> {
        self.context
            .animator()
            .map(|animator| animator.available_animations())
            .unwrap_or_default()
    }

    /// Play `animation` directly, bypassing the flow. The active state is
    /// unchanged and will take over again on its next transition.
    pub fn play_animation(&mut self, animation: &str) -> bool {
        match self.context.animator_mut() {
            Some(animator) => {
                animator.play(animation);
                true
            }
            None => false,
        }
    }

    pub fn get_parameter<T: FromParam>(&self, name: &str) -> T {
        self.context.get_parameter(name)
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.context.set_parameter(name, value);
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.context.has_parameter(name)
    }

    pub fn remove_parameter(&mut self, name: &str) -> bool {
        self.context.remove_parameter(name)
    }

    /// Drop every runtime parameter, reserved ones included.
    pub fn clear_parameters(&mut self) {
        self.context.clear_runtime_values();
    }

    pub fn context(&self) -> &ParameterContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ParameterContext {
        &mut self.context
    }

    /// Re-extract the description of the running flow.
    pub fn describe(&self, registry: &StateRegistry) -> FlowDescription {
        FlowDescription::from_states(registry.states(self.owner), self.initial.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::recording::{AnimatorCall, RecordingAnimator};
    use crate::components::condition::{CmpOp, Condition};
    use crate::components::transition::Transition;

    fn controller(registry: &mut StateRegistry, animator: &RecordingAnimator) -> FlowController {
        let owner = registry.allocate_owner();
        FlowController::new(owner, Some(Box::new(animator.clone()))).unwrap()
    }

    fn locomotion() -> Vec<FlowState> {
        vec![
            FlowState::looping("idle", "idle").with_transition(Transition::with_condition(
                "walk",
                Condition::float("Speed", CmpOp::Greater, 0.1),
            )),
            FlowState::looping("walk", "walk").with_transition(Transition::with_condition(
                "idle",
                Condition::float("Speed", CmpOp::LessOrEqual, 0.1),
            )),
        ]
    }

    #[test]
    fn test_missing_animator_is_error() {
        let mut registry = StateRegistry::new();
        let owner = registry.allocate_owner();
        assert!(matches!(
            FlowController::new(owner, None),
            Err(FlowError::MissingAnimator { .. })
        ));
    }

    #[test]
    fn test_idle_controller_tick_is_noop() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        assert_eq!(controller.tick(&registry, 0.1), None);
        assert_eq!(controller.current_state_id(), None);
        assert!(!controller.has_parameter("TimeInState"));
    }

    #[test]
    fn test_install_enters_first_state_when_no_initial() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&["idle", "walk"]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        assert_eq!(controller.current_state_id(), Some("idle"));
        assert_eq!(
            animator.take_calls(),
            vec![
                AnimatorCall::Play("idle".into()),
                AnimatorCall::SetLooping(true)
            ]
        );
    }

    #[test]
    fn test_install_honours_initial_and_falls_back() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), Some("walk"))
            .unwrap();
        assert_eq!(controller.current_state_id(), Some("walk"));

        controller
            .install_states(&mut registry, locomotion(), Some("missing"))
            .unwrap();
        assert_eq!(controller.current_state_id(), Some("idle"));
    }

    #[test]
    fn test_tick_changes_state_when_condition_holds() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        controller.set_parameter("Speed", 0.0f32);

        assert_eq!(controller.tick(&registry, 0.1), None);
        assert_eq!(controller.current_state_id(), Some("idle"));

        controller.set_parameter("Speed", 5.0f32);
        let change = controller.tick(&registry, 0.1).unwrap();
        assert_eq!(change.from.as_deref(), Some("idle"));
        assert_eq!(change.to, "walk");
        assert_eq!(controller.current_state_id(), Some("walk"));
        assert_eq!(controller.previous_state_id(), Some("idle"));
    }

    #[test]
    fn test_time_in_state_accumulates_and_resets() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        let states = vec![
            FlowState::one_time("attack", "attack").with_transition(Transition::with_condition(
                "idle",
                Condition::float("TimeInState", CmpOp::GreaterOrEqual, 0.5),
            )),
            FlowState::looping("idle", "idle"),
        ];
        controller.install_states(&mut registry, states, None).unwrap();

        controller.tick(&registry, 0.25);
        assert!((controller.get_parameter::<f32>("TimeInState") - 0.25).abs() < 1e-6);
        assert_eq!(controller.current_state_id(), Some("attack"));

        let change = controller.tick(&registry, 0.25);
        assert_eq!(change.map(|c| c.to), Some("idle".to_string()));
        assert_eq!(controller.time_in_state(), 0.0);
        assert_eq!(controller.get_parameter::<f32>("TimeInState"), 0.0);
    }

    #[test]
    fn test_custom_time_parameter_name() {
        let mut registry = StateRegistry::new();
        let owner = registry.allocate_owner();
        let mut config = FlowConfig::new();
        config.time_in_state_parameter = "StateTime".to_string();
        let mut controller =
            FlowController::new(owner, Some(Box::new(RecordingAnimator::new(&[]))))
                .unwrap()
                .with_config(&config);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        controller.tick(&registry, 0.5);
        assert!(controller.has_parameter("StateTime"));
        assert!(!controller.has_parameter("TimeInState"));
    }

    #[test]
    fn test_animation_finished_parameter() {
        let mut registry = StateRegistry::new();
        let mut animator = RecordingAnimator::new(&[]);
        animator.finished = true;
        let mut controller = controller(&mut registry, &animator);
        let states = vec![
            FlowState::one_time("land", "land").with_transition(Transition::with_condition(
                "idle",
                Condition::bool("AnimationFinished", true),
            )),
            FlowState::looping("idle", "idle"),
        ];
        controller.install_states(&mut registry, states, None).unwrap();
        let change = controller.tick(&registry, 0.1);
        assert_eq!(change.map(|c| c.to), Some("idle".to_string()));
    }

    #[test]
    fn test_exit_and_enter_hooks_run_in_order() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        animator.take_calls();

        controller.set_parameter("Speed", 1.0f32);
        controller.tick(&registry, 0.1);
        assert_eq!(
            animator.take_calls(),
            vec![
                AnimatorCall::Play("walk".into()),
                AnimatorCall::SetLooping(true)
            ]
        );
    }

    #[test]
    fn test_unregistered_active_state_makes_controller_idle() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        registry.unregister(controller.owner(), "idle");

        assert_eq!(controller.tick(&registry, 0.1), None);
        assert_eq!(controller.current_state_id(), None);
        assert_eq!(controller.previous_state_id(), Some("idle"));
        assert_eq!(controller.tick(&registry, 0.1), None);

        assert!(controller.force_transition(&registry, "walk").is_some());
        assert_eq!(controller.current_state_id(), Some("walk"));
    }

    #[test]
    fn test_force_transition() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();

        assert!(controller.force_transition(&registry, "missing").is_none());
        assert_eq!(controller.current_state_id(), Some("idle"));

        let change = controller.force_transition(&registry, "walk").unwrap();
        assert_eq!(change.to, "walk");
        assert_eq!(controller.current_state_id(), Some("walk"));
    }

    #[test]
    fn test_pending_transition_does_not_change_state() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        controller.set_parameter("Speed", 3.0f32);
        assert_eq!(controller.pending_transition(&registry), Some("walk".into()));
        assert_eq!(controller.current_state_id(), Some("idle"));
    }

    #[test]
    fn test_build_without_description_stays_idle() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        controller.build(&mut registry, None).unwrap();
        assert_eq!(controller.current_state_id(), None);
        assert!(controller.state_ids(&registry).is_empty());
    }

    #[test]
    fn test_build_or_else_uses_default_states() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .build_or_else(&mut registry, None, || {
                vec![FlowState::looping("fallback", "fallback")]
            })
            .unwrap();
        assert_eq!(controller.current_state_id(), Some("fallback"));
    }

    #[test]
    fn test_invalid_states_leave_registry_untouched() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();

        let result = controller.install_states(
            &mut registry,
            vec![FlowState::looping("broken", "")],
            None,
        );
        assert!(result.is_err());
        assert_eq!(controller.state_ids(&registry), vec!["idle", "walk"]);
        assert_eq!(controller.current_state_id(), Some("idle"));
    }

    #[test]
    fn test_rebuild_does_not_touch_other_controllers() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut first = controller(&mut registry, &animator);
        let mut second = controller(&mut registry, &animator);
        first.install_states(&mut registry, locomotion(), None).unwrap();
        second.install_states(&mut registry, locomotion(), None).unwrap();

        first
            .install_states(&mut registry, vec![FlowState::looping("solo", "solo")], None)
            .unwrap();

        assert_eq!(first.state_ids(&registry), vec!["solo"]);
        assert_eq!(second.state_ids(&registry), vec!["idle", "walk"]);
        assert!(second.has_state(&registry, "walk"));
        assert!(!first.has_state(&registry, "walk"));
    }

    #[test]
    fn test_play_animation_bypasses_flow() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&["idle", "wave"]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        animator.take_calls();

        assert!(controller.play_animation("wave"));
        assert_eq!(animator.take_calls(), vec![AnimatorCall::Play("wave".into())]);
        assert_eq!(controller.current_state_id(), Some("idle"));
        assert_eq!(controller.available_animations(), vec!["idle", "wave"]);
    }

    #[test]
    fn test_teardown_unregisters_and_goes_idle() {
        let mut registry = StateRegistry::new();
        let animator = RecordingAnimator::new(&[]);
        let mut controller = controller(&mut registry, &animator);
        controller
            .install_states(&mut registry, locomotion(), None)
            .unwrap();
        controller.teardown(&mut registry);
        assert!(registry.is_empty());
        assert_eq!(controller.current_state_id(), None);
        assert_eq!(controller.tick(&registry, 0.1), None);
    }
}
