//! Flow descriptions: the authored, serializable form of a flow.
//!
//! Authoring tools produce a [`FlowDescription`]: flat lists of state and
//! transition records, where each transition carries a tree of condition
//! records. A controller translates it into the live
//! [`FlowState`]/[`Transition`]/[`Condition`] graph when it is built, and
//! [`FlowDescription::from_states`] extracts an equivalent description back
//! from a live graph.
//!
//! Descriptions are stored as JSON.

use log::{info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::components::condition::{
    CmpOp, CompositeMode, Condition, ConditionKind, DEFAULT_FLOAT_EPSILON, StrOp,
};
use crate::components::flowstate::{FlowState, StateKind, StateType};
use crate::components::parameters::{ParamKind, ParamValue};
use crate::components::transition::Transition;
use crate::error::FlowError;
use crate::resources::animationstore::{AnimationResource, AnimationStore};
use crate::resources::flowconfig::FlowConfig;

/// Condition variant as written in a description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Bool,
    Int,
    Float,
    String,
    And,
    Or,
}

/// Union of numeric and string comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonType {
    #[default]
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Contains,
    StartsWith,
    EndsWith,
}

impl ComparisonType {
    fn numeric(self) -> Option<CmpOp> {
        match self {
            ComparisonType::Equal => Some(CmpOp::Equal),
            ComparisonType::NotEqual => Some(CmpOp::NotEqual),
            ComparisonType::Greater => Some(CmpOp::Greater),
            ComparisonType::GreaterOrEqual => Some(CmpOp::GreaterOrEqual),
            ComparisonType::Less => Some(CmpOp::Less),
            ComparisonType::LessOrEqual => Some(CmpOp::LessOrEqual),
            _ => None,
        }
    }

    fn string(self) -> Option<StrOp> {
        match self {
            ComparisonType::Equal => Some(StrOp::Equal),
            ComparisonType::NotEqual => Some(StrOp::NotEqual),
            ComparisonType::Contains => Some(StrOp::Contains),
            ComparisonType::StartsWith => Some(StrOp::StartsWith),
            ComparisonType::EndsWith => Some(StrOp::EndsWith),
            _ => None,
        }
    }
}

impl From<CmpOp> for ComparisonType {
    fn from(op: CmpOp) -> Self {
        match op {
            CmpOp::Equal => ComparisonType::Equal,
            CmpOp::NotEqual => ComparisonType::NotEqual,
            CmpOp::Greater => ComparisonType::Greater,
            CmpOp::GreaterOrEqual => ComparisonType::GreaterOrEqual,
            CmpOp::Less => ComparisonType::Less,
            CmpOp::LessOrEqual => ComparisonType::LessOrEqual,
        }
    }
}

impl From<StrOp> for ComparisonType {
    fn from(op: StrOp) -> Self {
        match op {
            StrOp::Equal => ComparisonType::Equal,
            StrOp::NotEqual => ComparisonType::NotEqual,
            StrOp::Contains => ComparisonType::Contains,
            StrOp::StartsWith => ComparisonType::StartsWith,
            StrOp::EndsWith => ComparisonType::EndsWith,
        }
    }
}

fn default_epsilon() -> f32 {
    DEFAULT_FLOAT_EPSILON
}

fn is_default_epsilon(epsilon: &f32) -> bool {
    *epsilon == DEFAULT_FLOAT_EPSILON
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One node of a condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameter_name: String,
    #[serde(default)]
    pub comparison: ComparisonType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ParamValue>,
    #[serde(default = "default_epsilon", skip_serializing_if = "is_default_epsilon")]
    pub epsilon: f32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_negated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ConditionRecord>,
}

impl Default for ConditionRecord {
    fn default() -> Self {
        Self::group(ConditionType::And, Vec::new())
    }
}

impl ConditionRecord {
    /// A comparison record over `parameter_name`.
    pub fn compare(
        condition_type: ConditionType,
        parameter_name: impl Into<String>,
        comparison: ComparisonType,
        value: impl Into<ParamValue>,
    ) -> Self {
        Self {
            condition_type,
            name: String::new(),
            parameter_name: parameter_name.into(),
            comparison,
            value: Some(value.into()),
            epsilon: DEFAULT_FLOAT_EPSILON,
            case_sensitive: false,
            is_negated: false,
            children: Vec::new(),
        }
    }

    /// An And/Or record over `children`.
    pub fn group(condition_type: ConditionType, children: Vec<ConditionRecord>) -> Self {
        Self {
            condition_type,
            name: String::new(),
            parameter_name: String::new(),
            comparison: ComparisonType::Equal,
            value: None,
            epsilon: DEFAULT_FLOAT_EPSILON,
            case_sensitive: false,
            is_negated: false,
            children,
        }
    }

    pub fn negated(mut self) -> Self {
        self.is_negated = !self.is_negated;
        self
    }

    fn label(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else if !self.parameter_name.is_empty() {
            self.parameter_name.clone()
        } else {
            format!("{:?}", self.condition_type)
        }
    }

    fn invalid_comparison(&self) -> FlowError {
        FlowError::InvalidComparison {
            condition: self.label(),
            kind: format!("{:?}", self.condition_type),
            comparison: format!("{:?}", self.comparison),
        }
    }

    fn operand(&self, kind: ParamKind) -> Result<ParamValue, FlowError> {
        let converted = match (&self.value, kind) {
            // null string operands compare as empty strings
            (None, ParamKind::String) => Some(ParamValue::Str(String::new())),
            (None, _) => None,
            (Some(value), kind) => value.convert(kind),
        };
        converted.ok_or_else(|| FlowError::InvalidOperand {
            condition: self.label(),
            kind: format!("{:?}", self.condition_type),
            value: self
                .value
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "<missing>".to_string()),
        })
    }

    /// Translate into a live condition tree.
    pub fn to_condition(&self) -> Result<Condition, FlowError> {
        let mut condition = match self.condition_type {
            ConditionType::Bool => {
                if self.comparison != ComparisonType::Equal {
                    return Err(self.invalid_comparison());
                }
                let ParamValue::Bool(expected) = self.operand(ParamKind::Bool)? else {
                    return Err(self.invalid_comparison());
                };
                Condition::bool(self.parameter_name.clone(), expected)
            }
            ConditionType::Int => {
                let op = self
                    .comparison
                    .numeric()
                    .ok_or_else(|| self.invalid_comparison())?;
                let ParamValue::Int(value) = self.operand(ParamKind::Int)? else {
                    return Err(self.invalid_comparison());
                };
                Condition::int(self.parameter_name.clone(), op, value)
            }
            ConditionType::Float => {
                let op = self
                    .comparison
                    .numeric()
                    .ok_or_else(|| self.invalid_comparison())?;
                let ParamValue::Float(value) = self.operand(ParamKind::Float)? else {
                    return Err(self.invalid_comparison());
                };
                Condition::float_with_epsilon(self.parameter_name.clone(), op, value, self.epsilon)
            }
            ConditionType::String => {
                let op = self
                    .comparison
                    .string()
                    .ok_or_else(|| self.invalid_comparison())?;
                let ParamValue::Str(value) = self.operand(ParamKind::String)? else {
                    return Err(self.invalid_comparison());
                };
                Condition::string(self.parameter_name.clone(), op, value)
                    .case_sensitive(self.case_sensitive)
            }
            ConditionType::And | ConditionType::Or => {
                let mode = if self.condition_type == ConditionType::And {
                    CompositeMode::And
                } else {
                    CompositeMode::Or
                };
                let children = self
                    .children
                    .iter()
                    .map(ConditionRecord::to_condition)
                    .collect::<Result<Vec<_>, _>>()?;
                Condition::composite(mode, children)
            }
        };
        if !self.name.is_empty() {
            condition.name = self.name.clone();
        }
        condition.negated = self.is_negated;
        condition.validate()?;
        Ok(condition)
    }

    /// Extract the record form of a live condition tree.
    pub fn from_condition(condition: &Condition) -> Self {
        let mut record = match &condition.kind {
            ConditionKind::Bool {
                parameter,
                expected,
            } => Self::compare(
                ConditionType::Bool,
                parameter.clone(),
                ComparisonType::Equal,
                *expected,
            ),
            ConditionKind::Int {
                parameter,
                op,
                value,
            } => Self::compare(ConditionType::Int, parameter.clone(), (*op).into(), *value),
            ConditionKind::Float {
                parameter,
                op,
                value,
                epsilon,
            } => {
                let mut record =
                    Self::compare(ConditionType::Float, parameter.clone(), (*op).into(), *value);
                record.epsilon = *epsilon;
                record
            }
            ConditionKind::String {
                parameter,
                op,
                value,
                case_sensitive,
            } => {
                let mut record = Self::compare(
                    ConditionType::String,
                    parameter.clone(),
                    (*op).into(),
                    value.clone(),
                );
                record.case_sensitive = *case_sensitive;
                record
            }
            ConditionKind::Composite { mode, children } => {
                let condition_type = match mode {
                    CompositeMode::And => ConditionType::And,
                    CompositeMode::Or => ConditionType::Or,
                };
                Self::group(
                    condition_type,
                    children.iter().map(ConditionRecord::from_condition).collect(),
                )
            }
        };
        record.name = condition.name.clone();
        record.is_negated = condition.negated;
        record
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: String,
    pub state_type: StateType,
    pub animation_name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_initial: bool,
    /// Frame pinned by a HoldFrame state; ignored by other types.
    #[serde(default)]
    pub frame_to_hold: usize,
}

impl StateRecord {
    pub fn new(
        id: impl Into<String>,
        state_type: StateType,
        animation_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            state_type,
            animation_name: animation_name.into(),
            is_initial: false,
            frame_to_hold: 0,
        }
    }

    pub fn initial(mut self) -> Self {
        self.is_initial = true;
        self
    }

    fn kind(&self) -> StateKind {
        match self.state_type {
            StateType::OneTime => StateKind::OneTime,
            StateType::Looping => StateKind::Looping,
            StateType::HoldFrame => StateKind::HoldFrame {
                frame: self.frame_to_hold,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_state_id: String,
    pub to_state_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_state_type: Option<StateType>,
    /// Root of the condition tree; omitted means unconditional.
    #[serde(default)]
    pub conditions: ConditionRecord,
}

impl TransitionRecord {
    pub fn new(from: impl Into<String>, to: impl Into<String>, conditions: ConditionRecord) -> Self {
        Self {
            from_state_id: from.into(),
            to_state_id: to.into(),
            target_state_type: None,
            conditions,
        }
    }
}

/// Clip definition carried alongside a flow, for the sprite animator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClipRecord {
    pub name: String,
    pub frame_count: usize,
    pub fps: f32,
    #[serde(default)]
    pub looped: bool,
}

/// Authored description of a whole flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDescription {
    pub states: Vec<StateRecord>,
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<AnimationClipRecord>,
}

impl FlowDescription {
    /// Loads a flow description from a JSON file at the specified path.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self, FlowError> {
        let file_content = std::fs::read_to_string(path.as_ref())?;
        let description = Self::from_json_str(&file_content)?;
        info!(
            "Loaded flow {:?}: {} states, {} transitions",
            path.as_ref(),
            description.states.len(),
            description.transitions.len()
        );
        Ok(description)
    }

    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), FlowError> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Id of the first state flagged initial.
    pub fn initial_state(&self) -> Option<&str> {
        self.states
            .iter()
            .find(|state| state.is_initial)
            .map(|state| state.id.as_str())
    }

    /// Check the whole description without building anything.
    pub fn validate(&self) -> Result<(), FlowError> {
        self.build_states().map(|_| ())
    }

    /// Translate into live states, in record order, with their transitions.
    ///
    /// A repeated state id replaces the earlier record in place. Transitions
    /// towards unknown states are kept: they stay dormant until such a state
    /// is registered.
    pub fn build_states(&self) -> Result<Vec<FlowState>, FlowError> {
        let mut states: Vec<FlowState> = Vec::with_capacity(self.states.len());
        let mut index: FxHashMap<&str, usize> = FxHashMap::default();

        for record in &self.states {
            let state = FlowState::new(record.id.clone(), record.animation_name.clone(), record.kind());
            state.validate()?;
            match index.get(record.id.as_str()) {
                Some(&position) => {
                    warn!("Flow description repeats state '{}'; last one wins", record.id);
                    states[position] = state;
                }
                None => {
                    index.insert(record.id.as_str(), states.len());
                    states.push(state);
                }
            }
        }

        for record in &self.transitions {
            let Some(&position) = index.get(record.from_state_id.as_str()) else {
                return Err(FlowError::UnknownSourceState {
                    from: record.from_state_id.clone(),
                    to: record.to_state_id.clone(),
                });
            };
            if !index.contains_key(record.to_state_id.as_str()) {
                warn!(
                    "Transition {} -> {} targets an unknown state and will stay dormant",
                    record.from_state_id, record.to_state_id
                );
            }
            let transition = Transition {
                target: record.to_state_id.clone(),
                target_type: record.target_state_type,
                condition: record.conditions.to_condition()?,
            };
            states[position].add_transition(transition);
        }

        Ok(states)
    }

    /// Extract a description from live states.
    pub fn from_states<'a>(
        states: impl IntoIterator<Item = &'a FlowState>,
        initial: Option<&str>,
    ) -> Self {
        let mut description = FlowDescription::default();
        for state in states {
            let (state_type, frame_to_hold) = match state.kind {
                StateKind::OneTime => (StateType::OneTime, 0),
                StateKind::Looping => (StateType::Looping, 0),
                StateKind::HoldFrame { frame } => (StateType::HoldFrame, frame),
            };
            description.states.push(StateRecord {
                id: state.id.clone(),
                state_type,
                animation_name: state.animation.clone(),
                is_initial: initial == Some(state.id.as_str()),
                frame_to_hold,
            });
            for transition in &state.transitions {
                description.transitions.push(TransitionRecord {
                    from_state_id: state.id.clone(),
                    to_state_id: transition.target.clone(),
                    target_state_type: transition.target_type,
                    conditions: ConditionRecord::from_condition(&transition.condition),
                });
            }
        }
        description
    }

    /// Clip store for a sprite animator playing this flow.
    ///
    /// Clips defined in `animations` are used as-is; every other animation a
    /// state references gets a clip built from the configured defaults.
    pub fn animation_store(&self, config: &FlowConfig) -> AnimationStore {
        let mut store = AnimationStore::default();
        for clip in &self.animations {
            store.insert(
                clip.name.clone(),
                AnimationResource {
                    frame_count: clip.frame_count,
                    fps: clip.fps,
                    looped: clip.looped,
                },
            );
        }
        for state in &self.states {
            if store.get(&state.animation_name).is_none() {
                store.insert(
                    state.animation_name.clone(),
                    AnimationResource {
                        frame_count: config.default_frame_count,
                        fps: config.default_fps,
                        looped: state.state_type == StateType::Looping,
                    },
                );
            }
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCOMOTION: &str = r#"{
        "states": [
            {"id": "idle", "state_type": "Looping", "animation_name": "idle_anim", "is_initial": true},
            {"id": "walk", "state_type": "Looping", "animation_name": "walk_anim"},
            {"id": "pose", "state_type": "HoldFrame", "animation_name": "pose_anim", "frame_to_hold": 2}
        ],
        "transitions": [
            {"from_state_id": "idle", "to_state_id": "walk",
             "conditions": {"type": "Float", "parameter_name": "Speed", "comparison": "Greater", "value": 0.1}},
            {"from_state_id": "walk", "to_state_id": "idle", "target_state_type": "Looping",
             "conditions": {"type": "Float", "parameter_name": "Speed", "comparison": "Greater", "value": 0.1, "is_negated": true}},
            {"from_state_id": "walk", "to_state_id": "pose"}
        ],
        "animations": [{"name": "idle_anim", "frame_count": 4, "fps": 8.0, "looped": true}]
    }"#;

    #[test]
    fn test_parse_and_build() {
        let description = FlowDescription::from_json_str(LOCOMOTION).unwrap();
        assert_eq!(description.initial_state(), Some("idle"));

        let states = description.build_states().unwrap();
        assert_eq!(states.len(), 3);
        assert_eq!(states[0].transitions.len(), 1);
        assert_eq!(states[1].transitions.len(), 2);
        assert_eq!(states[1].transitions[0].target_type, Some(StateType::Looping));
        assert!(states[1].transitions[0].condition.negated);
        assert_eq!(states[2].kind, StateKind::HoldFrame { frame: 2 });
    }

    #[test]
    fn test_omitted_conditions_mean_unconditional() {
        let description = FlowDescription::from_json_str(LOCOMOTION).unwrap();
        let states = description.build_states().unwrap();
        let unconditional = &states[1].transitions[1].condition;
        assert!(unconditional.is_composite());
        assert!(unconditional.children().is_empty());
        assert!(unconditional.evaluate(&Default::default()));
    }

    #[test]
    fn test_unknown_source_state_is_error() {
        let description = FlowDescription {
            states: vec![StateRecord::new("idle", StateType::Looping, "idle")],
            transitions: vec![TransitionRecord::new("ghost", "idle", ConditionRecord::default())],
            animations: Vec::new(),
        };
        assert!(matches!(
            description.validate(),
            Err(FlowError::UnknownSourceState { .. })
        ));
    }

    #[test]
    fn test_unknown_target_is_allowed() {
        let description = FlowDescription {
            states: vec![StateRecord::new("idle", StateType::Looping, "idle")],
            transitions: vec![TransitionRecord::new("idle", "ghost", ConditionRecord::default())],
            animations: Vec::new(),
        };
        assert!(description.validate().is_ok());
    }

    #[test]
    fn test_empty_ids_and_names_are_errors() {
        let mut description = FlowDescription {
            states: vec![StateRecord::new("", StateType::Looping, "idle")],
            ..Default::default()
        };
        assert!(matches!(
            description.validate(),
            Err(FlowError::EmptyStateId { .. })
        ));
        description.states = vec![StateRecord::new("idle", StateType::Looping, "")];
        assert!(matches!(
            description.validate(),
            Err(FlowError::EmptyAnimationName { .. })
        ));
    }

    #[test]
    fn test_invalid_comparison_for_type() {
        let record = ConditionRecord::compare(
            ConditionType::Int,
            "Lives",
            ComparisonType::Contains,
            3,
        );
        assert!(matches!(
            record.to_condition(),
            Err(FlowError::InvalidComparison { .. })
        ));
        let record =
            ConditionRecord::compare(ConditionType::String, "Name", ComparisonType::Less, "a");
        assert!(record.to_condition().is_err());
    }

    #[test]
    fn test_invalid_operand_for_type() {
        let record =
            ConditionRecord::compare(ConditionType::Int, "Lives", ComparisonType::Equal, "many");
        assert!(matches!(
            record.to_condition(),
            Err(FlowError::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_operand_is_coerced() {
        let record =
            ConditionRecord::compare(ConditionType::Float, "Speed", ComparisonType::Greater, 1);
        let condition = record.to_condition().unwrap();
        assert!(matches!(
            condition.kind,
            ConditionKind::Float { value, .. } if value == 1.0
        ));
    }

    #[test]
    fn test_missing_string_operand_is_empty() {
        let mut record =
            ConditionRecord::compare(ConditionType::String, "Name", ComparisonType::Equal, "x");
        record.value = None;
        let condition = record.to_condition().unwrap();
        assert!(matches!(
            &condition.kind,
            ConditionKind::String { value, .. } if value.is_empty()
        ));
    }

    #[test]
    fn test_empty_parameter_name_is_error() {
        let record =
            ConditionRecord::compare(ConditionType::Bool, "", ComparisonType::Equal, true);
        assert!(matches!(
            record.to_condition(),
            Err(FlowError::EmptyParameterName { .. })
        ));
    }

    #[test]
    fn test_condition_record_round_trip() {
        let record = ConditionRecord::group(
            ConditionType::Or,
            vec![
                ConditionRecord::compare(ConditionType::Bool, "Grounded", ComparisonType::Equal, true)
                    .negated(),
                ConditionRecord::compare(
                    ConditionType::String,
                    "Surface",
                    ComparisonType::StartsWith,
                    "ice",
                ),
            ],
        );
        let condition = record.to_condition().unwrap();
        let extracted = ConditionRecord::from_condition(&condition);
        let rebuilt = extracted.to_condition().unwrap();
        assert!(rebuilt.same_shape(&condition));
        assert_eq!(ConditionRecord::from_condition(&rebuilt), extracted);
    }

    #[test]
    fn test_description_json_round_trip() {
        let description = FlowDescription::from_json_str(LOCOMOTION).unwrap();
        let json = description.to_json_string().unwrap();
        let parsed = FlowDescription::from_json_str(&json).unwrap();
        assert_eq!(parsed, description);
    }

    #[test]
    fn test_duplicate_state_records_last_wins() {
        let description = FlowDescription {
            states: vec![
                StateRecord::new("idle", StateType::Looping, "idle_v1"),
                StateRecord::new("walk", StateType::Looping, "walk"),
                StateRecord::new("idle", StateType::OneTime, "idle_v2"),
            ],
            ..Default::default()
        };
        let states = description.build_states().unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].animation, "idle_v2");
    }

    #[test]
    fn test_animation_store_fills_defaults() {
        let description = FlowDescription::from_json_str(LOCOMOTION).unwrap();
        let config = FlowConfig::new();
        let store = description.animation_store(&config);
        assert_eq!(store.get("idle_anim").unwrap().frame_count, 4);
        let walk = store.get("walk_anim").unwrap();
        assert_eq!(walk.frame_count, config.default_frame_count);
        assert!(walk.looped);
        assert!(!store.get("pose_anim").unwrap().looped);
    }
}
