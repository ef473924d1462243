//! Error types for flow building and validation.
//!
//! Only authoring and initialization problems are errors. Runtime absence
//! (unset parameters, unregistered targets) resolves to "condition false" or
//! "no transition" and never reaches this type.

/// Errors raised while validating or building an animation flow.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum FlowError {
    /// A parameter comparison condition has no parameter name.
    #[error("condition '{condition}' has an empty parameter name")]
    EmptyParameterName { condition: String },

    /// A float condition was authored with a negative or non-finite epsilon.
    #[error("condition '{condition}' has an invalid epsilon: {epsilon}")]
    InvalidEpsilon { condition: String, epsilon: f32 },

    /// A state record or state instance has no identifier.
    #[error("state has an empty id (animation '{animation}')")]
    EmptyStateId { animation: String },

    /// A state has no animation to play.
    #[error("state '{state}' has an empty animation name")]
    EmptyAnimationName { state: String },

    /// A transition record starts from a state that is not part of the flow.
    #[error("transition to '{to}' starts from unknown state '{from}'")]
    UnknownSourceState { from: String, to: String },

    /// The comparison operator does not apply to the condition type.
    #[error("comparison {comparison} is not valid for {kind} condition '{condition}'")]
    InvalidComparison {
        condition: String,
        kind: String,
        comparison: String,
    },

    /// The operand cannot be converted to the condition type.
    #[error("operand {value} is not valid for {kind} condition '{condition}'")]
    InvalidOperand {
        condition: String,
        kind: String,
        value: String,
    },

    /// The controller was created without a playback target.
    #[error("no animator available for flow controller {owner}")]
    MissingAnimator { owner: String },

    /// Reading or writing a flow description failed.
    #[error("flow description i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A flow description could not be parsed or serialized.
    #[error("flow description json error: {0}")]
    Json(#[from] serde_json::Error),
}
