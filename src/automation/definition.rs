//! Automation and step definitions
//!
//! An automation is an ordered list of step specs: the trigger first, then
//! the actions. Definitions are plain data, deserializable from YAML or
//! JSON, and validated before a run starts.

use serde::{Deserialize, Serialize};

use super::context::TRIGGER_ALIAS;

/// Type tag of the trigger step (always the first step).
pub const TRIGGER_STEP_TYPE: &str = "trigger";

/// Type tag of the sandboxed script step.
pub const SCRIPT_STEP_TYPE: &str = "script";

/// A complete automation definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    /// Automation name (required).
    pub name: String,

    /// Ordered steps; the first is the trigger.
    pub steps: Vec<StepSpec>,
}

/// A single step in an automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Stable id, unique within the automation; used as a binding key.
    pub id: String,

    /// Step type tag ("trigger", "script", "log", "createRow", ...).
    #[serde(rename = "type")]
    pub step_type: String,

    /// Human-readable name (for logging).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Step parameters; string values may contain `{{ ... }}` bindings.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// The event payload that starts a run; seeds the trigger's outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl TriggerPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Structural problems in an automation definition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DefinitionError {
    #[error("automation '{0}' has no steps")]
    Empty(String),

    #[error("first step '{0}' must have type '{TRIGGER_STEP_TYPE}'")]
    MissingTrigger(String),

    #[error("step '{0}' redeclares the trigger")]
    ExtraTrigger(String),

    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),

    #[error("step id '{0}' is reserved")]
    ReservedStepId(String),

    #[error("step at position {0} has an empty id")]
    EmptyStepId(usize),
}

impl Automation {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The trigger step spec, if the definition has any steps.
    pub fn trigger(&self) -> Option<&StepSpec> {
        self.steps.first()
    }

    /// The action steps (everything after the trigger).
    pub fn actions(&self) -> &[StepSpec] {
        if self.steps.is_empty() {
            &[]
        } else {
            &self.steps[1..]
        }
    }

    /// Check the structural invariants: non-empty, trigger first and only
    /// first, unique non-empty ids, reserved alias unused by actions.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let Some(first) = self.steps.first() else {
            return Err(DefinitionError::Empty(self.name.clone()));
        };
        if first.step_type != TRIGGER_STEP_TYPE {
            return Err(DefinitionError::MissingTrigger(first.id.clone()));
        }

        let mut seen = std::collections::HashSet::new();
        for (position, step) in self.steps.iter().enumerate() {
            if step.id.is_empty() {
                return Err(DefinitionError::EmptyStepId(position));
            }
            if position > 0 && step.step_type == TRIGGER_STEP_TYPE {
                return Err(DefinitionError::ExtraTrigger(step.id.clone()));
            }
            if position > 0 && step.id == TRIGGER_ALIAS {
                return Err(DefinitionError::ReservedStepId(step.id.clone()));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(DefinitionError::DuplicateStepId(step.id.clone()));
            }
        }
        Ok(())
    }
}

impl StepSpec {
    pub fn new(id: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step_type: step_type.into(),
            name: None,
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step_automation() -> Automation {
        Automation {
            name: "test".to_string(),
            steps: vec![
                StepSpec::new("start", TRIGGER_STEP_TYPE),
                StepSpec::new("log-step", "log")
                    .with_param("text", serde_json::json!("hello")),
            ],
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(two_step_automation().validate().is_ok());
    }

    #[test]
    fn test_validate_empty() {
        let automation = Automation {
            name: "empty".to_string(),
            steps: vec![],
        };
        assert_eq!(
            automation.validate(),
            Err(DefinitionError::Empty("empty".to_string()))
        );
    }

    #[test]
    fn test_validate_trigger_must_be_first() {
        let mut automation = two_step_automation();
        automation.steps.reverse();
        assert!(matches!(
            automation.validate(),
            Err(DefinitionError::MissingTrigger(_))
        ));
    }

    #[test]
    fn test_validate_rejects_second_trigger() {
        let mut automation = two_step_automation();
        automation
            .steps
            .push(StepSpec::new("another", TRIGGER_STEP_TYPE));
        assert_eq!(
            automation.validate(),
            Err(DefinitionError::ExtraTrigger("another".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut automation = two_step_automation();
        automation.steps.push(StepSpec::new("log-step", "log"));
        assert_eq!(
            automation.validate(),
            Err(DefinitionError::DuplicateStepId("log-step".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_reserved_action_id() {
        let mut automation = two_step_automation();
        automation.steps.push(StepSpec::new("trigger", "log"));
        assert_eq!(
            automation.validate(),
            Err(DefinitionError::ReservedStepId("trigger".to_string()))
        );
    }

    #[test]
    fn test_deserialize_yaml() {
        let yaml = r#"
name: double-a-value
steps:
  - id: start
    type: trigger
  - id: script-step
    type: script
    params:
      code: "return steps['trigger'].fields.value * 2"
"#;
        let automation = Automation::from_yaml(yaml).unwrap();
        assert_eq!(automation.name, "double-a-value");
        assert_eq!(automation.steps.len(), 2);
        assert_eq!(automation.actions()[0].step_type, "script");
        assert!(automation.validate().is_ok());
    }

    #[test]
    fn test_deserialize_json_params_keep_structure() {
        let json = r#"
{
  "name": "rows",
  "steps": [
    { "id": "start", "type": "trigger" },
    {
      "id": "create-row-step",
      "type": "createRow",
      "params": { "row": { "name": "Test Row", "value": 42 } }
    }
  ]
}
"#;
        let automation = Automation::from_json(json).unwrap();
        let row = &automation.actions()[0].params["row"];
        assert_eq!(row["value"], serde_json::json!(42));
    }

    #[test]
    fn test_trigger_payload_builder() {
        let payload = TriggerPayload::new()
            .with_field("value", serde_json::json!(10))
            .with_field("tags", serde_json::json!(["a", "b"]));
        assert_eq!(payload.fields["value"], serde_json::json!(10));
    }
}
