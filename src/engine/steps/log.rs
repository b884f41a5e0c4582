//! Server log step
//!
//! Writes a message to the process log and echoes it in the output record,
//! so later steps can reference `steps['log-step'].message`.
//!
//! Parameters:
//! - `text`: the message; bindings are already resolved by the dispatcher.

use async_trait::async_trait;
use tracing::info;

use crate::automation::{bindings, ExecutionContext};
use crate::engine::registry::{StepError, StepHandler};

pub struct LogStep;

#[async_trait]
impl StepHandler for LogStep {
    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> Result<serde_json::Value, StepError> {
        let message = match params.get("text") {
            Some(serde_json::Value::String(s)) => s.clone(),
            // A single-span binding may have resolved to a non-string.
            Some(other) if !other.is_null() => bindings::stringify(other),
            _ => return Err(StepError::MissingParameter("text".to_string())),
        };

        info!(target: "stepchain::automation", "{}", message);
        Ok(serde_json::json!({ "message": message, "success": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_echoes_message() {
        let ctx = ExecutionContext::new();
        let outputs = LogStep
            .execute(serde_json::json!({ "text": "Starting multi-step automation" }), &ctx)
            .await
            .unwrap();
        assert_eq!(
            outputs["message"],
            serde_json::json!("Starting multi-step automation")
        );
        assert_eq!(outputs["success"], serde_json::json!(true));
    }

    #[tokio::test]
    async fn test_log_coerces_non_string() {
        let ctx = ExecutionContext::new();
        let outputs = LogStep
            .execute(serde_json::json!({ "text": 84 }), &ctx)
            .await
            .unwrap();
        assert_eq!(outputs["message"], serde_json::json!("84"));
    }

    #[tokio::test]
    async fn test_log_missing_text() {
        let ctx = ExecutionContext::new();
        let err = LogStep
            .execute(serde_json::json!({}), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, StepError::MissingParameter("text".to_string()));
    }
}
