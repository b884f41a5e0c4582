//! Shared test helpers: a fluent builder for automations and a runner with
//! the built-in step registry.

use std::sync::Arc;

use stepchain::prelude::*;
use stepchain::{TRIGGER_STEP_TYPE, SCRIPT_STEP_TYPE};

/// Builds an automation step by step, mirroring how embedding applications
/// assemble definitions.
pub struct AutomationBuilder {
    name: String,
    steps: Vec<StepSpec>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl AutomationBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: vec![StepSpec::new("start", TRIGGER_STEP_TYPE)],
            fields: serde_json::Map::new(),
        }
    }

    /// Set the trigger payload fields for `run`.
    pub fn trigger_fields(mut self, fields: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = fields {
            self.fields = map;
        }
        self
    }

    pub fn server_log(mut self, text: &str, step_id: &str) -> Self {
        self.steps
            .push(StepSpec::new(step_id, "log").with_param("text", serde_json::json!(text)));
        self
    }

    pub fn create_row(mut self, row: serde_json::Value, step_id: &str) -> Self {
        self.steps
            .push(StepSpec::new(step_id, "createRow").with_param("row", row));
        self
    }

    pub fn execute_script(mut self, code: &str, step_id: &str) -> Self {
        self.steps.push(
            StepSpec::new(step_id, SCRIPT_STEP_TYPE).with_param("code", serde_json::json!(code)),
        );
        self
    }

    /// Append an arbitrary step.
    pub fn step(mut self, step_type: &str, step_id: &str, params: serde_json::Value) -> Self {
        let mut spec = StepSpec::new(step_id, step_type);
        if let serde_json::Value::Object(map) = params {
            spec.params = map;
        }
        self.steps.push(spec);
        self
    }

    pub fn build(self) -> (Automation, TriggerPayload) {
        (
            Automation {
                name: self.name,
                steps: self.steps,
            },
            TriggerPayload {
                fields: self.fields,
            },
        )
    }

    /// Build and run against the built-in registry.
    pub async fn run(self) -> RunResult {
        let (automation, payload) = self.build();
        let runner = AutomationRunner::new(Arc::new(StepRegistry::builtin()));
        runner
            .run(&automation, payload)
            .await
            .expect("definition should be valid")
    }
}
