//! Automation definitions and binding resolution
//!
//! The data side of the engine: step specs, trigger payloads, the per-run
//! execution context, the `{{ ... }}` binding resolver, and file loading.

pub mod bindings;
pub mod context;
pub mod definition;
pub mod loader;

pub use context::{ContextEntry, ExecutionContext, TRIGGER_ALIAS};
pub use definition::{
    Automation, DefinitionError, StepSpec, TriggerPayload, SCRIPT_STEP_TYPE, TRIGGER_STEP_TYPE,
};
pub use loader::{AutomationLoader, LoadError};
