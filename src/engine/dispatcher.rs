//! Step dispatcher
//!
//! Takes one step spec and the current context, resolves its parameter
//! bindings, and routes it: script steps go to the sandbox, everything else
//! to its registered handler. The dispatcher never errors on step logic:
//! script faults and handler failures come back as `success: false` output
//! records. Errors here are infrastructure problems the orchestrator treats
//! as fatal.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::automation::{bindings, ExecutionContext, StepSpec, SCRIPT_STEP_TYPE};
use crate::script::{ScriptOutcome, ScriptSandbox};

use super::error::EngineError;
use super::registry::StepRegistry;

pub struct StepDispatcher {
    registry: Arc<StepRegistry>,
    sandbox: ScriptSandbox,
}

impl StepDispatcher {
    pub fn new(registry: Arc<StepRegistry>, sandbox: ScriptSandbox) -> Self {
        Self { registry, sandbox }
    }

    /// Execute one step and return its output record.
    #[instrument(skip(self, ctx), fields(step = %spec.id, step_type = %spec.step_type))]
    pub async fn dispatch(
        &self,
        spec: &StepSpec,
        ctx: &ExecutionContext,
    ) -> Result<serde_json::Value, EngineError> {
        let params = bindings::resolve_deep(
            &serde_json::Value::Object(spec.params.clone()),
            ctx,
        );

        if spec.step_type == SCRIPT_STEP_TYPE {
            return self.dispatch_script(spec, &params, ctx);
        }

        let Some(handler) = self.registry.get(&spec.step_type) else {
            return Err(EngineError::UnknownStepType {
                step: spec.id.clone(),
                step_type: spec.step_type.clone(),
            });
        };

        match handler.execute(params, ctx).await {
            Ok(outputs) => {
                debug!("step completed");
                Ok(outputs)
            }
            Err(err) => {
                warn!(error = %err, "step reported a failure");
                Ok(serde_json::json!({ "success": false, "error": err.to_string() }))
            }
        }
    }

    fn dispatch_script(
        &self,
        spec: &StepSpec,
        params: &serde_json::Value,
        ctx: &ExecutionContext,
    ) -> Result<serde_json::Value, EngineError> {
        let code = match params.get("code") {
            Some(serde_json::Value::String(code)) => code,
            Some(_) => {
                return Err(EngineError::MalformedParameters {
                    step: spec.id.clone(),
                    reason: "'code' must be a string".to_string(),
                });
            }
            None => {
                return Err(EngineError::MissingParameter {
                    step: spec.id.clone(),
                    param: "code".to_string(),
                });
            }
        };

        match self.sandbox.execute(code, ctx) {
            ScriptOutcome::Success { result } => {
                debug!("script completed");
                Ok(serde_json::json!({ "result": result, "success": true }))
            }
            ScriptOutcome::Failure { error } => {
                warn!(%error, "script failed");
                Ok(serde_json::json!({ "success": false, "error": error }))
            }
        }
    }
}
