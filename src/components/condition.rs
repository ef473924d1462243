//! Composable boolean conditions over a [`ParameterContext`].
//!
//! A [`Condition`] is either a typed parameter comparison (bool, int, float,
//! string) or a composite that combines child conditions with AND/OR. Every
//! condition carries a negation flag applied after the inner evaluation:
//!
//! ```text
//! evaluate(c, ctx) = c.negated XOR inner(c, ctx)
//! ```
//!
//! A comparison whose parameter is missing evaluates its inner result to
//! `false`, so a negated comparison over a missing parameter is `true`.
//! Composites short-circuit in declaration order; an empty AND is `true` and
//! is the root of an unconditional transition, an empty OR is `false`.
//!
//! # Example
//!
//! ```ignore
//! let landing = Condition::all(vec![
//!     Condition::bool("Grounded", true),
//!     Condition::float("VerticalVelocity", CmpOp::Less, -0.5),
//! ]);
//! assert!(!landing.evaluate(&ctx));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::components::parameters::ParameterContext;
use crate::error::FlowError;

/// Default equality tolerance for float comparisons.
pub const DEFAULT_FLOAT_EPSILON: f32 = 1e-4;

/// Numeric comparison operator used by int and float conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CmpOp::Equal => "==",
            CmpOp::NotEqual => "!=",
            CmpOp::Greater => ">",
            CmpOp::GreaterOrEqual => ">=",
            CmpOp::Less => "<",
            CmpOp::LessOrEqual => "<=",
        };
        f.write_str(symbol)
    }
}

/// String comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrOp {
    Equal,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
}

impl fmt::Display for StrOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrOp::Equal => "==",
            StrOp::NotEqual => "!=",
            StrOp::Contains => "contains",
            StrOp::StartsWith => "starts with",
            StrOp::EndsWith => "ends with",
        };
        f.write_str(name)
    }
}

/// How a composite combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeMode {
    And,
    Or,
}

/// Variant-specific payload of a [`Condition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionKind {
    Bool {
        parameter: String,
        expected: bool,
    },
    Int {
        parameter: String,
        op: CmpOp,
        value: i32,
    },
    Float {
        parameter: String,
        op: CmpOp,
        value: f32,
        epsilon: f32,
    },
    String {
        parameter: String,
        op: StrOp,
        value: String,
        case_sensitive: bool,
    },
    Composite {
        mode: CompositeMode,
        children: Vec<Condition>,
    },
}

impl ConditionKind {
    /// Short label of the variant, used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            ConditionKind::Bool { .. } => "bool",
            ConditionKind::Int { .. } => "int",
            ConditionKind::Float { .. } => "float",
            ConditionKind::String { .. } => "string",
            ConditionKind::Composite {
                mode: CompositeMode::And,
                ..
            } => "and",
            ConditionKind::Composite {
                mode: CompositeMode::Or,
                ..
            } => "or",
        }
    }
}

/// A boolean predicate over runtime parameters.
///
/// `id` identifies the condition for tooling only; it never affects
/// evaluation. Use [`Condition::duplicate`] to instantiate an authored
/// condition into another controller with fresh identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: Uuid,
    pub name: String,
    pub negated: bool,
    pub kind: ConditionKind,
}

impl Condition {
    fn from_kind(kind: ConditionKind) -> Self {
        let name = default_name(&kind);
        Self {
            id: Uuid::new_v4(),
            name,
            negated: false,
            kind,
        }
    }

    /// `parameter == expected` over a bool parameter.
    pub fn bool(parameter: impl Into<String>, expected: bool) -> Self {
        Self::from_kind(ConditionKind::Bool {
            parameter: parameter.into(),
            expected,
        })
    }

    pub fn int(parameter: impl Into<String>, op: CmpOp, value: i32) -> Self {
        Self::from_kind(ConditionKind::Int {
            parameter: parameter.into(),
            op,
            value,
        })
    }

    /// Float comparison with the default equality epsilon.
    pub fn float(parameter: impl Into<String>, op: CmpOp, value: f32) -> Self {
        Self::float_with_epsilon(parameter, op, value, DEFAULT_FLOAT_EPSILON)
    }

    pub fn float_with_epsilon(
        parameter: impl Into<String>,
        op: CmpOp,
        value: f32,
        epsilon: f32,
    ) -> Self {
        Self::from_kind(ConditionKind::Float {
            parameter: parameter.into(),
            op,
            value,
            epsilon,
        })
    }

    /// Case-insensitive string comparison.
    pub fn string(parameter: impl Into<String>, op: StrOp, value: impl Into<String>) -> Self {
        Self::from_kind(ConditionKind::String {
            parameter: parameter.into(),
            op,
            value: value.into(),
            case_sensitive: false,
        })
    }

    pub fn composite(mode: CompositeMode, children: Vec<Condition>) -> Self {
        Self::from_kind(ConditionKind::Composite { mode, children })
    }

    /// AND over `children`. Empty means always true.
    pub fn all(children: Vec<Condition>) -> Self {
        Self::composite(CompositeMode::And, children)
    }

    /// OR over `children`. Empty means always false.
    pub fn any(children: Vec<Condition>) -> Self {
        Self::composite(CompositeMode::Or, children)
    }

    /// The unconditional condition: an empty AND.
    pub fn always() -> Self {
        Self::all(Vec::new())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Flip the negation flag (builder pattern).
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Make a string condition case-sensitive. No effect on other variants.
    pub fn case_sensitive(mut self, sensitive: bool) -> Self {
        if let ConditionKind::String { case_sensitive, .. } = &mut self.kind {
            *case_sensitive = sensitive;
        }
        self
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, ConditionKind::Composite { .. })
    }

    /// Parameter read by a comparison condition. `None` for composites.
    pub fn parameter(&self) -> Option<&str> {
        match &self.kind {
            ConditionKind::Bool { parameter, .. }
            | ConditionKind::Int { parameter, .. }
            | ConditionKind::Float { parameter, .. }
            | ConditionKind::String { parameter, .. } => Some(parameter),
            ConditionKind::Composite { .. } => None,
        }
    }

    pub fn children(&self) -> &[Condition] {
        match &self.kind {
            ConditionKind::Composite { children, .. } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Condition>> {
        match &mut self.kind {
            ConditionKind::Composite { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Append a child to a composite. Returns the child back when `self` is
    /// not a composite.
    pub fn push_child(&mut self, child: Condition) -> Result<(), Condition> {
        match self.children_mut() {
            Some(children) => {
                children.push(child);
                Ok(())
            }
            None => Err(child),
        }
    }

    /// Evaluate against `ctx`, applying the negation flag.
    pub fn evaluate(&self, ctx: &ParameterContext) -> bool {
        self.evaluate_observed(ctx, &mut |_, _| {})
    }

    /// Evaluate like [`evaluate`](Self::evaluate) and report every condition
    /// actually visited, with its negation-adjusted result, to `observer`.
    ///
    /// Children skipped by short-circuiting are never reported.
    pub fn evaluate_observed(
        &self,
        ctx: &ParameterContext,
        observer: &mut dyn FnMut(&Condition, bool),
    ) -> bool {
        let inner = self.evaluate_internal(ctx, observer);
        let result = inner != self.negated;
        observer(self, result);
        result
    }

    fn evaluate_internal(
        &self,
        ctx: &ParameterContext,
        observer: &mut dyn FnMut(&Condition, bool),
    ) -> bool {
        match &self.kind {
            ConditionKind::Bool {
                parameter,
                expected,
            } => {
                if !ctx.has_parameter(parameter) {
                    return false;
                }
                ctx.get_parameter::<bool>(parameter) == *expected
            }
            ConditionKind::Int {
                parameter,
                op,
                value,
            } => {
                if !ctx.has_parameter(parameter) {
                    return false;
                }
                let current = ctx.get_parameter::<i32>(parameter);
                match op {
                    CmpOp::Equal => current == *value,
                    CmpOp::NotEqual => current != *value,
                    CmpOp::Greater => current > *value,
                    CmpOp::GreaterOrEqual => current >= *value,
                    CmpOp::Less => current < *value,
                    CmpOp::LessOrEqual => current <= *value,
                }
            }
            ConditionKind::Float {
                parameter,
                op,
                value,
                epsilon,
            } => {
                if !ctx.has_parameter(parameter) {
                    return false;
                }
                let current = ctx.get_parameter::<f32>(parameter);
                match op {
                    CmpOp::Equal => (current - *value).abs() < *epsilon,
                    CmpOp::NotEqual => (current - *value).abs() >= *epsilon,
                    CmpOp::Greater => current > *value,
                    CmpOp::GreaterOrEqual => current >= *value,
                    CmpOp::Less => current < *value,
                    CmpOp::LessOrEqual => current <= *value,
                }
            }
            ConditionKind::String {
                parameter,
                op,
                value,
                case_sensitive,
            } => {
                if !ctx.has_parameter(parameter) {
                    return false;
                }
                let current = ctx.get_parameter::<String>(parameter);
                let (current, target) = if *case_sensitive {
                    (current, value.clone())
                } else {
                    (current.to_lowercase(), value.to_lowercase())
                };
                match op {
                    StrOp::Equal => current == target,
                    StrOp::NotEqual => current != target,
                    StrOp::Contains => current.contains(target.as_str()),
                    StrOp::StartsWith => current.starts_with(target.as_str()),
                    StrOp::EndsWith => current.ends_with(target.as_str()),
                }
            }
            ConditionKind::Composite { mode, children } => match mode {
                CompositeMode::And => {
                    for child in children {
                        if !child.evaluate_observed(ctx, observer) {
                            return false;
                        }
                    }
                    true
                }
                CompositeMode::Or => {
                    for child in children {
                        if child.evaluate_observed(ctx, observer) {
                            return true;
                        }
                    }
                    false
                }
            },
        }
    }

    /// Check the authored shape. Called when a flow is built, never per tick.
    pub fn validate(&self) -> Result<(), FlowError> {
        match &self.kind {
            ConditionKind::Composite { children, .. } => {
                for child in children {
                    child.validate()?;
                }
                Ok(())
            }
            ConditionKind::Float {
                parameter, epsilon, ..
            } => {
                self.require_parameter(parameter)?;
                if !epsilon.is_finite() || *epsilon < 0.0 {
                    return Err(FlowError::InvalidEpsilon {
                        condition: self.name.clone(),
                        epsilon: *epsilon,
                    });
                }
                Ok(())
            }
            ConditionKind::Bool { parameter, .. }
            | ConditionKind::Int { parameter, .. }
            | ConditionKind::String { parameter, .. } => self.require_parameter(parameter),
        }
    }

    fn require_parameter(&self, parameter: &str) -> Result<(), FlowError> {
        if parameter.is_empty() {
            return Err(FlowError::EmptyParameterName {
                condition: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Deep copy with fresh identities for this node and every descendant.
    pub fn duplicate(&self) -> Condition {
        let kind = match &self.kind {
            ConditionKind::Composite { mode, children } => ConditionKind::Composite {
                mode: *mode,
                children: children.iter().map(Condition::duplicate).collect(),
            },
            other => other.clone(),
        };
        Condition {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            negated: self.negated,
            kind,
        }
    }

    /// Structural equality ignoring identities.
    pub fn same_shape(&self, other: &Condition) -> bool {
        if self.name != other.name || self.negated != other.negated {
            return false;
        }
        match (&self.kind, &other.kind) {
            (
                ConditionKind::Composite { mode, children },
                ConditionKind::Composite {
                    mode: other_mode,
                    children: other_children,
                },
            ) => {
                mode == other_mode
                    && children.len() == other_children.len()
                    && children
                        .iter()
                        .zip(other_children)
                        .all(|(a, b)| a.same_shape(b))
            }
            (a, b) => a == b,
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::always()
    }
}

fn default_name(kind: &ConditionKind) -> String {
    match kind {
        ConditionKind::Bool {
            parameter,
            expected,
        } => format!("{} == {}", parameter, expected),
        ConditionKind::Int {
            parameter,
            op,
            value,
        } => format!("{} {} {}", parameter, op, value),
        ConditionKind::Float {
            parameter,
            op,
            value,
            ..
        } => format!("{} {} {}", parameter, op, value),
        ConditionKind::String {
            parameter,
            op,
            value,
            ..
        } => format!("{} {} \"{}\"", parameter, op, value),
        ConditionKind::Composite {
            mode: CompositeMode::And,
            ..
        } => "AND".to_string(),
        ConditionKind::Composite {
            mode: CompositeMode::Or,
            ..
        } => "OR".to_string(),
    }
}
