//! Built-in step implementations
//!
//! A small library of steps that ships with the engine so automations are
//! runnable out of the box. Anything else is registered by the embedding
//! application through the `StepRegistry`.

pub mod delay;
pub mod log;
pub mod row;

use std::sync::Arc;

use super::registry::StepRegistry;

pub use delay::DelayStep;
pub use log::LogStep;
pub use row::CreateRowStep;

/// Register the built-in steps on a registry.
pub fn register_builtins(registry: &mut StepRegistry) {
    registry.register("log", Arc::new(LogStep));
    registry.register("createRow", Arc::new(CreateRowStep::new()));
    registry.register("delay", Arc::new(DelayStep));
}
