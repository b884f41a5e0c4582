//! Run orchestrator
//!
//! Drives one automation run: validates the definition, seeds the context
//! with the trigger payload, then dispatches each action step in declared
//! order, committing every output record to the context before advancing.
//! Each `run` call builds its own context, dispatcher, and result, so a
//! single runner can serve concurrent runs without shared mutable state.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use crate::automation::{Automation, ExecutionContext, TriggerPayload};
use crate::script::{SandboxConfig, ScriptSandbox};

use super::dispatcher::StepDispatcher;
use super::error::EngineError;
use super::registry::StepRegistry;
use super::result::{RunResult, RunStatus, StepRecord};

/// Runner configuration.
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Overall run deadline, checked between steps. `None` disables it.
    pub run_timeout: Option<std::time::Duration>,

    /// Resource caps for script steps.
    pub script: SandboxConfig,
}

/// Executes automations against a step registry.
pub struct AutomationRunner {
    registry: Arc<StepRegistry>,
    config: RunnerConfig,
}

impl AutomationRunner {
    pub fn new(registry: Arc<StepRegistry>) -> Self {
        Self {
            registry,
            config: RunnerConfig::default(),
        }
    }

    pub fn with_config(registry: Arc<StepRegistry>, config: RunnerConfig) -> Self {
        Self { registry, config }
    }

    /// Run an automation against a trigger payload.
    ///
    /// Definition problems found before any step executes return `Err`; the
    /// run never started. Once running, a fatal condition (unknown step
    /// type, malformed script step, run timeout) ends the run with
    /// `RunStatus::Error` and the records produced so far; soft step
    /// failures are recorded and execution continues.
    #[instrument(skip(self, automation, trigger), fields(automation = %automation.name))]
    pub async fn run(
        &self,
        automation: &Automation,
        trigger: TriggerPayload,
    ) -> Result<RunResult, EngineError> {
        automation.validate()?;

        let started = Instant::now();
        let mut ctx = ExecutionContext::new();
        info!(run_id = %ctx.run_id(), "starting automation run");

        // The trigger's output record is just the event payload.
        let trigger_spec = &automation.steps[0];
        let trigger_outputs = serde_json::json!({ "fields": trigger.fields });
        ctx.record(&trigger_spec.id, trigger_outputs.clone())?;
        let trigger_record = StepRecord {
            id: trigger_spec.id.clone(),
            step_type: trigger_spec.step_type.clone(),
            outputs: trigger_outputs,
        };

        let dispatcher = StepDispatcher::new(
            Arc::clone(&self.registry),
            ScriptSandbox::new(self.config.script.clone()),
        );

        let mut steps = Vec::with_capacity(automation.actions().len());
        for spec in automation.actions() {
            if let Some(limit) = self.config.run_timeout {
                if started.elapsed() >= limit {
                    let fatal = EngineError::RunTimedOut(limit);
                    warn!(step = %spec.id, "{}", fatal);
                    return Ok(self.finish_error(&ctx, automation, fatal, trigger_record, steps));
                }
            }

            match dispatcher.dispatch(spec, &ctx).await {
                Ok(outputs) => {
                    ctx.record(&spec.id, outputs.clone())?;
                    let record = StepRecord {
                        id: spec.id.clone(),
                        step_type: spec.step_type.clone(),
                        outputs,
                    };
                    if record.is_success() {
                        debug!(step = %record.id, "step recorded");
                    } else {
                        warn!(step = %record.id, "step failed; run continues");
                    }
                    steps.push(record);
                }
                Err(fatal) => {
                    error!(step = %spec.id, error = %fatal, "fatal step failure; run stopped");
                    return Ok(self.finish_error(&ctx, automation, fatal, trigger_record, steps));
                }
            }
        }

        info!(executed = steps.len(), "automation run completed");
        Ok(RunResult {
            run_id: ctx.run_id().to_string(),
            automation: automation.name.clone(),
            status: RunStatus::Success,
            trigger: trigger_record,
            steps,
        })
    }

    fn finish_error(
        &self,
        ctx: &ExecutionContext,
        automation: &Automation,
        fatal: EngineError,
        trigger: StepRecord,
        steps: Vec<StepRecord>,
    ) -> RunResult {
        RunResult {
            run_id: ctx.run_id().to_string(),
            automation: automation.name.clone(),
            status: RunStatus::Error {
                message: fatal.to_string(),
            },
            trigger,
            steps,
        }
    }
}
