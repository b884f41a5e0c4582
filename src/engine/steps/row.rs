//! Row creation step
//!
//! Stores a row in an in-memory table and reports it back with a generated
//! id. The store is per-handler-instance: registering a fresh handler gives
//! a fresh table, and tests can keep their own `Arc` to inspect what was
//! written.
//!
//! Parameters:
//! - `row`: object of column values.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::automation::ExecutionContext;
use crate::engine::registry::{StepError, StepHandler};

#[derive(Default)]
pub struct CreateRowStep {
    rows: Mutex<Vec<serde_json::Value>>,
}

impl CreateRowStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row created through this handler.
    pub fn rows(&self) -> Vec<serde_json::Value> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StepHandler for CreateRowStep {
    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> Result<serde_json::Value, StepError> {
        let row = match params.get("row") {
            Some(serde_json::Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(StepError::InvalidParameter {
                    name: "row".to_string(),
                    reason: "must be an object".to_string(),
                });
            }
            None => return Err(StepError::MissingParameter("row".to_string())),
        };

        let id = uuid::Uuid::new_v4().to_string();
        let mut stored = row;
        stored.insert("_id".to_string(), serde_json::Value::String(id.clone()));
        let stored = serde_json::Value::Object(stored);

        if let Ok(mut rows) = self.rows.lock() {
            rows.push(stored.clone());
        }
        info!(target: "stepchain::automation", row_id = %id, "created row");

        Ok(serde_json::json!({ "row": stored, "id": id, "success": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_row_outputs() {
        let ctx = ExecutionContext::new();
        let step = CreateRowStep::new();
        let outputs = step
            .execute(
                serde_json::json!({ "row": { "name": "Test Row", "value": 42 } }),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(outputs["row"]["value"], serde_json::json!(42));
        assert_eq!(outputs["success"], serde_json::json!(true));
        assert_eq!(outputs["row"]["_id"], outputs["id"]);
        assert_eq!(step.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_create_row_requires_object() {
        let ctx = ExecutionContext::new();
        let step = CreateRowStep::new();

        let err = step
            .execute(serde_json::json!({ "row": "not an object" }), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidParameter { .. }));

        let err = step.execute(serde_json::json!({}), &ctx).await.unwrap_err();
        assert_eq!(err, StepError::MissingParameter("row".to_string()));
    }

    #[tokio::test]
    async fn test_rows_accumulate_per_instance() {
        let ctx = ExecutionContext::new();
        let step = CreateRowStep::new();
        for value in [1, 2, 3] {
            step.execute(serde_json::json!({ "row": { "value": value } }), &ctx)
                .await
                .unwrap();
        }
        assert_eq!(step.rows().len(), 3);

        let other = CreateRowStep::new();
        assert!(other.rows().is_empty());
    }
}
