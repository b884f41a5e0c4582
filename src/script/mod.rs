//! Sandboxed script execution
//!
//! Runs user-supplied script code against the execution context of a run.
//! The sandbox is an in-crate interpreter for a deterministic
//! JavaScript-like language: the only binding carrying engine data is
//! `steps` (a read-only mirror of the context), and the standard library is
//! pure: no file, network, process, clock, or randomness access exists in
//! the evaluator at all.
//!
//! Outcomes are captured, never thrown: any fault (reference, type, syntax,
//! resource cap) becomes a `ScriptOutcome::Failure` whose message keeps the
//! fault category, e.g. `ReferenceError: total is not defined`.
//!
//! ```
//! use stepchain::automation::ExecutionContext;
//! use stepchain::script::{ScriptOutcome, ScriptSandbox};
//!
//! let ctx = ExecutionContext::new();
//! let sandbox = ScriptSandbox::default();
//! match sandbox.execute("return 2 + 2", &ctx) {
//!     ScriptOutcome::Success { result } => assert_eq!(result, serde_json::json!(4)),
//!     ScriptOutcome::Failure { error } => panic!("{}", error),
//! }
//! ```

mod ast;
mod builtins;
mod error;
mod interpreter;
mod parser;
mod token;
mod value;

use std::time::Duration;

use crate::automation::ExecutionContext;

pub use error::ScriptError;

/// Resource caps for one script execution.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Wall-clock cap per execution.
    pub timeout: Duration,

    /// Operation budget; every statement and expression evaluation costs one.
    pub max_ops: u64,

    /// Maximum nested call depth.
    pub max_call_depth: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            max_ops: 1_000_000,
            max_call_depth: 64,
        }
    }
}

/// The result of one script execution.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    Success { result: serde_json::Value },
    Failure { error: String },
}

impl ScriptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScriptOutcome::Success { .. })
    }
}

/// Executes script step code. Stateless: every `execute` builds a fresh
/// interpreter and global scope, so nothing persists between script steps of
/// the same or different runs.
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    config: SandboxConfig,
}

impl ScriptSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Execute `code` with the context injected as the `steps` binding. A
    /// top-level `return` supplies the result; faults are captured into the
    /// outcome rather than propagated.
    pub fn execute(&self, code: &str, ctx: &ExecutionContext) -> ScriptOutcome {
        match self.try_execute(code, ctx) {
            Ok(result) => ScriptOutcome::Success { result },
            Err(err) => ScriptOutcome::Failure {
                error: err.to_string(),
            },
        }
    }

    fn try_execute(
        &self,
        code: &str,
        ctx: &ExecutionContext,
    ) -> Result<serde_json::Value, ScriptError> {
        let program = parser::parse(code)?;
        let steps = value::Value::from_json(&ctx.steps_value());
        let globals = builtins::globals(steps);
        let mut interp = interpreter::Interpreter::new(&self.config);
        let result = interp.run(&program, &globals)?;
        Ok(result.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_trigger(fields: serde_json::Value) -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.record("trigger-step", serde_json::json!({ "fields": fields }))
            .unwrap();
        ctx
    }

    #[test]
    fn test_basic_script() {
        let ctx = ExecutionContext::new();
        let outcome = ScriptSandbox::default().execute("return 2 + 2", &ctx);
        assert_eq!(
            outcome,
            ScriptOutcome::Success {
                result: serde_json::json!(4)
            }
        );
    }

    #[test]
    fn test_steps_binding_by_alias() {
        let ctx = ctx_with_trigger(serde_json::json!({ "data": [1, 2, 3] }));
        let outcome = ScriptSandbox::default()
            .execute("return steps['trigger'].fields.data.map(x => x * 2)", &ctx);
        assert_eq!(
            outcome,
            ScriptOutcome::Success {
                result: serde_json::json!([2, 4, 6])
            }
        );
    }

    #[test]
    fn test_steps_binding_by_id_and_index() {
        let ctx = ctx_with_trigger(serde_json::json!({ "value": 7 }));
        let sandbox = ScriptSandbox::default();
        let by_id = sandbox.execute("return steps['trigger-step'].fields.value", &ctx);
        let by_index = sandbox.execute("return steps[0].fields.value", &ctx);
        assert_eq!(by_id, by_index);
        assert!(by_id.is_success());
    }

    #[test]
    fn test_reference_error_captured() {
        let ctx = ExecutionContext::new();
        let outcome =
            ScriptSandbox::default().execute("return nonexistentVariable.map(x => x)", &ctx);
        match outcome {
            ScriptOutcome::Failure { error } => {
                assert!(
                    error.contains("ReferenceError: nonexistentVariable is not defined"),
                    "{}",
                    error
                );
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_captured() {
        let ctx = ExecutionContext::new();
        let outcome = ScriptSandbox::default().execute("return ][", &ctx);
        match outcome {
            ScriptOutcome::Failure { error } => {
                assert!(error.starts_with("SyntaxError:"), "{}", error)
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_captured() {
        let ctx = ExecutionContext::new();
        let sandbox = ScriptSandbox::new(SandboxConfig {
            timeout: Duration::from_millis(25),
            max_ops: u64::MAX,
            ..SandboxConfig::default()
        });
        let outcome = sandbox.execute("while (true) {}", &ctx);
        match outcome {
            ScriptOutcome::Failure { error } => {
                assert!(error.contains("timed out"), "{}", error)
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_runaway_loop_is_bounded_by_default() {
        let ctx = ExecutionContext::new();
        let outcome = ScriptSandbox::default().execute("while (true) {}", &ctx);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_context_not_mutated() {
        let ctx = ctx_with_trigger(serde_json::json!({ "value": 1 }));
        // Scripts get a copy of the context; even rebinding locally cannot
        // touch the engine's view.
        let _ = ScriptSandbox::default().execute("let x = steps; return x", &ctx);
        assert_eq!(
            ctx.outputs("trigger").unwrap(),
            &serde_json::json!({ "fields": { "value": 1 } })
        );
    }

    #[test]
    fn test_no_state_across_invocations() {
        let ctx = ExecutionContext::new();
        let sandbox = ScriptSandbox::default();
        let first = sandbox.execute("let counter = 1; return counter", &ctx);
        assert!(first.is_success());
        let second = sandbox.execute("return counter", &ctx);
        match second {
            ScriptOutcome::Failure { error } => {
                assert!(error.contains("counter is not defined"), "{}", error)
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
