//! Execution context for automation runs
//!
//! The context is the append-only record of every step's outputs, built up
//! as a run progresses. Later steps address earlier ones by step id, by the
//! reserved alias `trigger` (always the first entry), or by position.

use std::collections::HashMap;

use super::definition::DefinitionError;

/// Reserved binding name for the first (trigger) entry.
pub const TRIGGER_ALIAS: &str = "trigger";

/// One committed step entry.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub step_id: String,
    pub outputs: serde_json::Value,
}

/// Per-run output store. Owned exclusively by one run; entries are immutable
/// once recorded.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: String,
    entries: Vec<ContextEntry>,
    by_id: HashMap<String, usize>,
}

impl ExecutionContext {
    /// Create an empty context with a generated run ID.
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            entries: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Append a step's outputs. Step ids may be recorded once; the alias is
    /// reserved for the first entry.
    pub fn record(
        &mut self,
        step_id: &str,
        outputs: serde_json::Value,
    ) -> Result<(), DefinitionError> {
        if self.by_id.contains_key(step_id) {
            return Err(DefinitionError::DuplicateStepId(step_id.to_string()));
        }
        if step_id == TRIGGER_ALIAS && !self.entries.is_empty() {
            return Err(DefinitionError::ReservedStepId(step_id.to_string()));
        }
        self.by_id.insert(step_id.to_string(), self.entries.len());
        self.entries.push(ContextEntry {
            step_id: step_id.to_string(),
            outputs,
        });
        Ok(())
    }

    /// Outputs for a step id, or for the trigger alias.
    pub fn outputs(&self, key: &str) -> Option<&serde_json::Value> {
        if let Some(index) = self.by_id.get(key) {
            return self.entries.get(*index).map(|e| &e.outputs);
        }
        if key == TRIGGER_ALIAS {
            return self.entries.first().map(|e| &e.outputs);
        }
        None
    }

    /// Outputs by execution position.
    pub fn outputs_at(&self, index: usize) -> Option<&serde_json::Value> {
        self.entries.get(index).map(|e| &e.outputs)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ContextEntry> {
        self.entries.iter()
    }

    /// The context as a JSON object for bindings and scripts: every entry
    /// under its position ("0", "1", ...) and its step id, plus the first
    /// entry under the `trigger` alias.
    ///
    /// The trigger's record is exposed directly (`steps.trigger.fields`);
    /// action records sit under an `outputs` key
    /// (`steps['script-step'].outputs.result`), matching how automations
    /// reference them.
    pub fn steps_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for index in 0..self.entries.len() {
            map.insert(index.to_string(), self.entry_view(index));
        }
        for (index, entry) in self.entries.iter().enumerate() {
            map.insert(entry.step_id.clone(), self.entry_view(index));
        }
        if !self.entries.is_empty() {
            map.insert(TRIGGER_ALIAS.to_string(), self.entry_view(0));
        }
        serde_json::Value::Object(map)
    }

    fn entry_view(&self, index: usize) -> serde_json::Value {
        let outputs = &self.entries[index].outputs;
        if index == 0 {
            outputs.clone()
        } else {
            serde_json::json!({ "outputs": outputs })
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context() {
        let ctx = ExecutionContext::new();
        assert!(!ctx.run_id().is_empty());
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_record_and_lookup() {
        let mut ctx = ExecutionContext::new();
        ctx.record("first", serde_json::json!({ "fields": { "a": 1 } }))
            .unwrap();
        ctx.record("second", serde_json::json!({ "message": "hi" }))
            .unwrap();

        assert_eq!(ctx.len(), 2);
        assert_eq!(
            ctx.outputs("second"),
            Some(&serde_json::json!({ "message": "hi" }))
        );
        assert_eq!(ctx.outputs("missing"), None);
        assert_eq!(ctx.outputs_at(0), ctx.outputs("first"));
    }

    #[test]
    fn test_trigger_alias_is_first_entry() {
        let mut ctx = ExecutionContext::new();
        ctx.record("my-trigger", serde_json::json!({ "fields": {} }))
            .unwrap();
        ctx.record("action", serde_json::json!({ "success": true }))
            .unwrap();

        assert_eq!(ctx.outputs(TRIGGER_ALIAS), ctx.outputs("my-trigger"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut ctx = ExecutionContext::new();
        ctx.record("step", serde_json::json!({})).unwrap();
        let err = ctx.record("step", serde_json::json!({})).unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateStepId("step".to_string()));
    }

    #[test]
    fn test_alias_reserved_for_first_entry() {
        let mut ctx = ExecutionContext::new();
        ctx.record("first", serde_json::json!({})).unwrap();
        let err = ctx
            .record(TRIGGER_ALIAS, serde_json::json!({}))
            .unwrap_err();
        assert_eq!(err, DefinitionError::ReservedStepId("trigger".to_string()));
    }

    #[test]
    fn test_steps_value_addressing() {
        let mut ctx = ExecutionContext::new();
        ctx.record("start", serde_json::json!({ "fields": { "v": 9 } }))
            .unwrap();
        ctx.record("log-step", serde_json::json!({ "message": "ok" }))
            .unwrap();

        let steps = ctx.steps_value();
        assert_eq!(steps["start"], steps["0"]);
        assert_eq!(steps["trigger"], steps["start"]);
        assert_eq!(steps["trigger"]["fields"]["v"], serde_json::json!(9));
        assert_eq!(
            steps["log-step"]["outputs"]["message"],
            serde_json::json!("ok")
        );
        assert_eq!(steps["1"], steps["log-step"]);
    }
}
