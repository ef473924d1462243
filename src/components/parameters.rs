//! Typed runtime parameters read by flow conditions.
//!
//! A [`ParameterContext`] is the single piece of mutable runtime state a flow
//! controller exposes: gameplay code writes inputs (`Speed`, `Grounded`, ...),
//! the controller writes its reserved parameters each tick, and conditions
//! read them. It also carries the [`Animator`] handle states play through.
//!
//! Values are stored as a [`ParamValue`] tagged union. Reading a value as a
//! different type goes through [`ParamValue::convert`], a total conversion
//! that returns `None` when no sensible conversion exists. Readers never fail:
//! missing names and failed conversions fall back to the type's default.

use std::fmt;

use log::warn;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::animator::Animator;

/// Type tag of a [`ParamValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    String,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::String => "string",
        };
        f.write_str(name)
    }
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Str(_) => ParamKind::String,
        }
    }

    /// Convert to `kind`, or `None` when the value has no meaning as that type.
    ///
    /// Numbers become booleans by comparing against zero, floats round to the
    /// nearest integer when in range, and strings are parsed.
    pub fn convert(&self, kind: ParamKind) -> Option<ParamValue> {
        match (self, kind) {
            (ParamValue::Bool(_), ParamKind::Bool)
            | (ParamValue::Int(_), ParamKind::Int)
            | (ParamValue::Float(_), ParamKind::Float)
            | (ParamValue::Str(_), ParamKind::String) => Some(self.clone()),

            (ParamValue::Bool(b), ParamKind::Int) => Some(ParamValue::Int(*b as i32)),
            (ParamValue::Bool(b), ParamKind::Float) => {
                Some(ParamValue::Float(if *b { 1.0 } else { 0.0 }))
            }
            (ParamValue::Int(i), ParamKind::Bool) => Some(ParamValue::Bool(*i != 0)),
            (ParamValue::Int(i), ParamKind::Float) => Some(ParamValue::Float(*i as f32)),
            (ParamValue::Float(f), ParamKind::Bool) => Some(ParamValue::Bool(*f != 0.0)),
            (ParamValue::Float(f), ParamKind::Int) => {
                let rounded = f.round();
                // i32::MAX is not representable; 2^31 is the first value out of range
                if rounded.is_finite()
                    && rounded >= i32::MIN as f32
                    && rounded < 2_147_483_648.0
                {
                    Some(ParamValue::Int(rounded as i32))
                } else {
                    None
                }
            }
            (other, ParamKind::String) => Some(ParamValue::Str(other.to_string())),

            (ParamValue::Str(s), ParamKind::Bool) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Some(ParamValue::Bool(true))
                } else if s.eq_ignore_ascii_case("false") {
                    Some(ParamValue::Bool(false))
                } else {
                    None
                }
            }
            (ParamValue::Str(s), ParamKind::Int) => s.trim().parse().ok().map(ParamValue::Int),
            (ParamValue::Str(s), ParamKind::Float) => {
                s.trim().parse().ok().map(ParamValue::Float)
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}
impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value)
    }
}
impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Float(value)
    }
}
impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}
impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

/// Rust types a parameter can be read as.
///
/// `Default` provides the fail-closed value returned for missing parameters
/// and failed conversions.
pub trait FromParam: Sized + Default {
    const KIND: ParamKind;

    fn from_param(value: &ParamValue) -> Option<Self>;
}

impl FromParam for bool {
    const KIND: ParamKind = ParamKind::Bool;
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value.convert(Self::KIND)? {
            ParamValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromParam for i32 {
    const KIND: ParamKind = ParamKind::Int;
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value.convert(Self::KIND)? {
            ParamValue::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl FromParam for f32 {
    const KIND: ParamKind = ParamKind::Float;
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value.convert(Self::KIND)? {
            ParamValue::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl FromParam for String {
    const KIND: ParamKind = ParamKind::String;
    fn from_param(value: &ParamValue) -> Option<Self> {
        match value.convert(Self::KIND)? {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Runtime parameter store plus the playback handle.
///
/// Names are case-sensitive. Empty names are never stored and always read as
/// absent.
#[derive(Default)]
pub struct ParameterContext {
    values: FxHashMap<String, ParamValue>,
    animator: Option<Box<dyn Animator>>,
}

impl ParameterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_animator(animator: Box<dyn Animator>) -> Self {
        Self {
            values: FxHashMap::default(),
            animator: Some(animator),
        }
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        !name.is_empty() && self.values.contains_key(name)
    }

    /// Raw stored value, without conversion.
    pub fn get_value(&self, name: &str) -> Option<&ParamValue> {
        if name.is_empty() {
            return None;
        }
        self.values.get(name)
    }

    /// Read a parameter as `T`, converting when the stored type differs.
    ///
    /// Returns `T::default()` for a missing or empty name. A stored value that
    /// cannot convert also yields the default and logs a warning.
    pub fn get_parameter<T: FromParam>(&self, name: &str) -> T {
        let Some(value) = self.get_value(name) else {
            return T::default();
        };
        match T::from_param(value) {
            Some(converted) => converted,
            None => {
                warn!(
                    "Parameter '{}' holds {} '{}' which cannot be read as {}",
                    name,
                    value.kind(),
                    value,
                    T::KIND
                );
                T::default()
            }
        }
    }

    /// Insert or replace a parameter. Empty names are rejected.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        if name.is_empty() {
            warn!("Ignoring parameter with an empty name");
            return;
        }
        self.values.insert(name, value.into());
    }

    pub fn remove_parameter(&mut self, name: &str) -> bool {
        self.values.remove(name).is_some()
    }

    /// Drop every runtime parameter. The animator handle is kept.
    pub fn clear_runtime_values(&mut self) {
        self.values.clear();
    }

    /// Read-only view of all parameters.
    pub fn parameters(&self) -> &FxHashMap<String, ParamValue> {
        &self.values
    }

    pub fn animator(&self) -> Option<&dyn Animator> {
        self.animator.as_deref()
    }

    pub fn animator_mut(&mut self) -> Option<&mut (dyn Animator + 'static)> {
        self.animator.as_deref_mut()
    }

    pub fn set_animator(&mut self, animator: Box<dyn Animator>) {
        self.animator = Some(animator);
    }

    pub fn has_animator(&self) -> bool {
        self.animator.is_some()
    }
}

impl fmt::Debug for ParameterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterContext")
            .field("values", &self.values)
            .field("animator", &self.animator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animator::recording::RecordingAnimator;

    #[test]
    fn test_has_parameter_empty_and_missing() {
        let mut ctx = ParameterContext::new();
        ctx.set_parameter("Speed", 1.0f32);
        assert!(ctx.has_parameter("Speed"));
        assert!(!ctx.has_parameter("speed"));
        assert!(!ctx.has_parameter("Missing"));
        assert!(!ctx.has_parameter(""));
    }

    #[test]
    fn test_set_parameter_rejects_empty_name() {
        let mut ctx = ParameterContext::new();
        ctx.set_parameter("", true);
        assert!(ctx.parameters().is_empty());
    }

    #[test]
    fn test_get_parameter_missing_returns_default() {
        let ctx = ParameterContext::new();
        assert!(!ctx.get_parameter::<bool>("Grounded"));
        assert_eq!(ctx.get_parameter::<i32>("Lives"), 0);
        assert_eq!(ctx.get_parameter::<f32>("Speed"), 0.0);
        assert_eq!(ctx.get_parameter::<String>("Name"), "");
        assert_eq!(ctx.get_parameter::<i32>(""), 0);
    }

    #[test]
    fn test_get_parameter_converts_between_types() {
        let mut ctx = ParameterContext::new();
        ctx.set_parameter("Lives", 3);
        ctx.set_parameter("Speed", 2.6f32);
        ctx.set_parameter("Flag", true);
        ctx.set_parameter("Text", " 42 ");

        assert_eq!(ctx.get_parameter::<f32>("Lives"), 3.0);
        assert!(ctx.get_parameter::<bool>("Lives"));
        assert_eq!(ctx.get_parameter::<i32>("Speed"), 3);
        assert_eq!(ctx.get_parameter::<i32>("Flag"), 1);
        assert_eq!(ctx.get_parameter::<String>("Flag"), "true");
        assert_eq!(ctx.get_parameter::<i32>("Text"), 42);
        assert_eq!(ctx.get_parameter::<f32>("Text"), 42.0);
    }

    #[test]
    fn test_float_to_int_rejects_values_past_i32_range() {
        assert_eq!(ParamValue::Float(2_147_483_648.0).convert(ParamKind::Int), None);
        assert_eq!(ParamValue::Float(f32::INFINITY).convert(ParamKind::Int), None);
        assert_eq!(
            ParamValue::Float(2_147_483_520.0).convert(ParamKind::Int),
            Some(ParamValue::Int(2_147_483_520))
        );
        assert_eq!(
            ParamValue::Float(-2_147_483_648.0).convert(ParamKind::Int),
            Some(ParamValue::Int(i32::MIN))
        );

        let mut ctx = ParameterContext::new();
        ctx.set_parameter("Huge", 3.0e9f32);
        assert_eq!(ctx.get_parameter::<i32>("Huge"), 0);
    }

    #[test]
    fn test_failed_conversion_falls_back_to_default() {
        let mut ctx = ParameterContext::new();
        ctx.set_parameter("Text", "fast");
        assert_eq!(ctx.get_parameter::<i32>("Text"), 0);
        assert!(!ctx.get_parameter::<bool>("Text"));
        ctx.set_parameter("Huge", f32::INFINITY);
        assert_eq!(ctx.get_parameter::<i32>("Huge"), 0);
    }

    #[test]
    fn test_string_to_bool_is_case_insensitive() {
        assert_eq!(
            ParamValue::from("TRUE").convert(ParamKind::Bool),
            Some(ParamValue::Bool(true))
        );
        assert_eq!(
            ParamValue::from("False").convert(ParamKind::Bool),
            Some(ParamValue::Bool(false))
        );
        assert_eq!(ParamValue::from("yes").convert(ParamKind::Bool), None);
    }

    #[test]
    fn test_remove_parameter() {
        let mut ctx = ParameterContext::new();
        ctx.set_parameter("Speed", 1.0f32);
        assert!(ctx.remove_parameter("Speed"));
        assert!(!ctx.remove_parameter("Speed"));
        assert!(!ctx.has_parameter("Speed"));
    }

    #[test]
    fn test_clear_keeps_animator() {
        let mut ctx = ParameterContext::with_animator(Box::new(RecordingAnimator::new(&["idle"])));
        ctx.set_parameter("Speed", 1.0f32);
        ctx.set_parameter("Grounded", true);
        ctx.clear_runtime_values();
        assert!(ctx.parameters().is_empty());
        assert!(ctx.has_animator());
    }

    #[test]
    fn test_set_parameter_replaces_type() {
        let mut ctx = ParameterContext::new();
        ctx.set_parameter("State", 1);
        ctx.set_parameter("State", "run");
        assert_eq!(ctx.get_value("State"), Some(&ParamValue::Str("run".into())));
    }
}
