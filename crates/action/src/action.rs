//! The action trait.

use async_trait::async_trait;
use pulsar_core::ErrorData;
use serde_json::Value;

use crate::context::ActionContext;
use crate::definition::ActionDefinition;
use crate::result::ActionResult;

/// Behavior contract every action implements.
///
/// Object-safe: the engine stores actions as `Arc<dyn Action>` in the
/// [`ActionRegistry`](crate::ActionRegistry) and invokes them through this
/// trait only. All results, including failures, come back as
/// [`ActionResult`] values; a panicking action is fenced by the engine and
/// converted into a failure.
#[async_trait]
pub trait Action: Send + Sync + 'static {
    /// Static metadata: key, kind, ports, optional params schema.
    fn definition(&self) -> &ActionDefinition;

    /// Execute the action with expanded params.
    async fn execute(&self, params: Value, context: &ActionContext) -> ActionResult;

    /// Resume after a non-retry suspension with host-supplied data.
    ///
    /// The default rejects the resume; actions that suspend with their own
    /// types must override this.
    async fn resume(
        &self,
        params: Value,
        context: &ActionContext,
        resume_data: Value,
    ) -> ActionResult {
        let _ = (params, context, resume_data);
        ActionResult::failure(ErrorData::new(
            "resume_not_supported",
            format!(
                "action `{}` suspended but does not implement resume",
                self.definition().key
            ),
        ))
    }

    /// One-time pre-flight hook, run before the first step of an execution.
    ///
    /// Receives the node's raw (un-expanded) params. A returned value is
    /// persisted as the node's preparation data; `Err` fails the execution
    /// before any node runs.
    async fn prepare(&self, params: &Value) -> Result<Option<Value>, ErrorData> {
        let _ = params;
        Ok(None)
    }
}
