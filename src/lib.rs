//! # stepchain
//!
//! A step-sequencing automation engine: an automation is an ordered list of
//! steps (a trigger followed by actions), and a run executes them in order,
//! threading every step's outputs into the context seen by the steps after
//! it.
//!
//! ## Features
//!
//! - **Declarative definitions** - Automations are plain data, loadable from
//!   YAML or JSON
//! - **Bindings** - `{{ steps.x.outputs }}` expressions in any string
//!   parameter reference earlier outputs by id, alias, or position
//! - **Sandboxed scripting** - A `script` step runs user code in an in-crate
//!   interpreter with only the `steps` binding and hard resource caps
//! - **Failure isolation** - A failing step is recorded and the run
//!   continues; only infrastructure errors stop a run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stepchain::{Automation, AutomationRunner, StepRegistry, TriggerPayload};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let automation = Automation::from_yaml(
//!         r#"
//! name: double-the-value
//! steps:
//!   - id: start
//!     type: trigger
//!   - id: script-step
//!     type: script
//!     params:
//!       code: "return steps['trigger'].fields.value * 2"
//!   - id: final-log
//!     type: log
//!     params:
//!       text: "Result is {{ steps['script-step'].outputs.result }}"
//! "#,
//!     )?;
//!
//!     let runner = AutomationRunner::new(Arc::new(StepRegistry::builtin()));
//!     let payload = TriggerPayload::new().with_field("value", serde_json::json!(21));
//!     let result = runner.run(&automation, payload).await?;
//!
//!     println!("run finished: success={}", result.is_success());
//!     Ok(())
//! }
//! ```

pub mod automation;
pub mod engine;
pub mod script;

// Re-export main types
pub use automation::{
    Automation, AutomationLoader, DefinitionError, ExecutionContext, LoadError, StepSpec,
    TriggerPayload, SCRIPT_STEP_TYPE, TRIGGER_ALIAS, TRIGGER_STEP_TYPE,
};
pub use engine::{
    AutomationRunner, EngineError, RunResult, RunStatus, RunnerConfig, StepDispatcher, StepError,
    StepHandler, StepRecord, StepRegistry,
};
pub use script::{SandboxConfig, ScriptError, ScriptOutcome, ScriptSandbox};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::automation::{Automation, AutomationLoader, StepSpec, TriggerPayload};
    pub use crate::engine::{
        AutomationRunner, EngineError, RunResult, RunStatus, RunnerConfig, StepError, StepHandler,
        StepRecord, StepRegistry,
    };
    pub use crate::script::{SandboxConfig, ScriptOutcome, ScriptSandbox};
}
