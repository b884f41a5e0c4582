//! Automation execution engine
//!
//! The run orchestrator, step dispatcher, step registry, and the built-in
//! step library.

pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod result;
pub mod runner;
pub mod steps;

pub use dispatcher::StepDispatcher;
pub use error::EngineError;
pub use registry::{StepError, StepHandler, StepRegistry};
pub use result::{RunResult, RunStatus, StepRecord};
pub use runner::{AutomationRunner, RunnerConfig};
