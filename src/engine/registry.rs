//! Step implementation registry
//!
//! Step types are resolved through an explicit registry object handed to the
//! runner at construction, never a process-wide singleton, so concurrent
//! runs can use different registries (e.g. test doubles) without interfering.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::automation::ExecutionContext;

/// Step-local failures reported by a handler. These are soft: the dispatcher
/// records them in the step's output record and the run continues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// A registered step implementation. Parameters arrive with all bindings
/// already resolved; the returned value is the step's output record.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ExecutionContext,
    ) -> Result<serde_json::Value, StepError>;
}

/// Maps step type tags to their implementations.
#[derive(Clone, Default)]
pub struct StepRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl StepRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in steps (`log`, `createRow`, `delay`).
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        super::steps::register_builtins(&mut registry);
        registry
    }

    pub fn register(&mut self, step_type: impl Into<String>, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(step_type.into(), handler);
    }

    /// Register a plain closure as a handler; convenient for test doubles.
    pub fn register_fn<F>(&mut self, step_type: impl Into<String>, f: F)
    where
        F: Fn(serde_json::Value) -> Result<serde_json::Value, StepError> + Send + Sync + 'static,
    {
        self.register(step_type, Arc::new(FnHandler(f)));
    }

    pub fn get(&self, step_type: &str) -> Option<&Arc<dyn StepHandler>> {
        self.handlers.get(step_type)
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.handlers.contains_key(step_type)
    }

    /// Registered type tags, sorted.
    pub fn step_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|k| k.as_str()).collect();
        types.sort_unstable();
        types
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> StepHandler for FnHandler<F>
where
    F: Fn(serde_json::Value) -> Result<serde_json::Value, StepError> + Send + Sync,
{
    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> Result<serde_json::Value, StepError> {
        (self.0)(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_fn_and_execute() {
        let mut registry = StepRegistry::new();
        registry.register_fn("echo", |params| {
            Ok(serde_json::json!({ "echoed": params, "success": true }))
        });

        assert!(registry.contains("echo"));
        assert!(!registry.contains("missing"));

        let handler = registry.get("echo").unwrap();
        let ctx = ExecutionContext::new();
        let outputs = handler
            .execute(serde_json::json!({ "x": 1 }), &ctx)
            .await
            .unwrap();
        assert_eq!(outputs["echoed"]["x"], serde_json::json!(1));
    }

    #[test]
    fn test_builtin_registry_contents() {
        let registry = StepRegistry::builtin();
        assert_eq!(registry.step_types(), vec!["createRow", "delay", "log"]);
    }

    #[tokio::test]
    async fn test_handler_error_is_step_error() {
        let mut registry = StepRegistry::new();
        registry.register_fn("failing", |_params| {
            Err(StepError::Failed("domain failure".to_string()))
        });

        let ctx = ExecutionContext::new();
        let err = registry
            .get("failing")
            .unwrap()
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "domain failure");
    }
}
