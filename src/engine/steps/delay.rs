//! Delay step
//!
//! Suspends the run for a number of milliseconds. The orchestrator awaits
//! the sleep like any other step I/O; it does not run ahead.
//!
//! Parameters:
//! - `time`: milliseconds to wait (non-negative number).

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::automation::ExecutionContext;
use crate::engine::registry::{StepError, StepHandler};

pub struct DelayStep;

#[async_trait]
impl StepHandler for DelayStep {
    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ExecutionContext,
    ) -> Result<serde_json::Value, StepError> {
        let millis = params
            .get("time")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| StepError::MissingParameter("time".to_string()))?;
        if millis < 0.0 || !millis.is_finite() {
            return Err(StepError::InvalidParameter {
                name: "time".to_string(),
                reason: "must be a non-negative number of milliseconds".to_string(),
            });
        }

        debug!(target: "stepchain::automation", millis, "delaying");
        tokio::time::sleep(Duration::from_millis(millis as u64)).await;
        Ok(serde_json::json!({ "success": true }))
    }
}
