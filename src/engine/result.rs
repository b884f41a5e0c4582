//! Run result types

use serde::{Deserialize, Serialize};

/// Outcome of one executed step: its id, type tag, and output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,

    #[serde(rename = "type")]
    pub step_type: String,

    pub outputs: serde_json::Value,
}

impl StepRecord {
    /// True unless the output record carries `success: false`.
    pub fn is_success(&self) -> bool {
        self.outputs.get("success") != Some(&serde_json::Value::Bool(false))
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunStatus {
    /// Every declared step was executed (some may have soft-failed).
    Success,
    /// A fatal condition stopped the run early.
    Error { message: String },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

/// Outcome of one automation run: the trigger's record, plus one record per
/// executed action step in execution order. `steps` is shorter than the
/// declared action list when a fatal condition stopped the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,

    pub automation: String,

    #[serde(flatten)]
    pub status: RunStatus,

    pub trigger: StepRecord,

    pub steps: Vec<StepRecord>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Output record of an executed step by id (or the trigger's).
    pub fn outputs(&self, step_id: &str) -> Option<&serde_json::Value> {
        if self.trigger.id == step_id {
            return Some(&self.trigger.outputs);
        }
        self.steps
            .iter()
            .find(|record| record.id == step_id)
            .map(|record| &record.outputs)
    }
}
