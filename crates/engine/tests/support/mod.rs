//! Stub actions and helpers shared by the engine test suites.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use pulsar_action::{
    Action, ActionContext, ActionDefinition, ActionRegistry, ActionResult, SuspensionType,
    WebhookSuspension,
};
use pulsar_core::ErrorData;
use pulsar_engine::GraphExecutor;
use serde_json::{Value, json};

/// Echoes whatever arrives on its `input` port. Also serves as the manual
/// trigger (the engine injects the trigger payload there).
pub struct Echo(ActionDefinition);

impl Echo {
    pub fn trigger() -> Arc<dyn Action> {
        Arc::new(Self(ActionDefinition::trigger("manual.trigger", "Manual")))
    }

    pub fn action() -> Arc<dyn Action> {
        Arc::new(Self(ActionDefinition::action("test.echo", "Echo")))
    }
}

#[async_trait]
impl Action for Echo {
    fn definition(&self) -> &ActionDefinition {
        &self.0
    }

    async fn execute(&self, _params: Value, context: &ActionContext) -> ActionResult {
        ActionResult::success(context.input_port("input").cloned().unwrap_or(Value::Null))
    }
}

/// Outputs its (expanded) params verbatim.
pub struct Emit(ActionDefinition);

impl Emit {
    pub fn handle() -> Arc<dyn Action> {
        Arc::new(Self(ActionDefinition::action("test.emit", "Emit")))
    }
}

#[async_trait]
impl Action for Emit {
    fn definition(&self) -> &ActionDefinition {
        &self.0
    }

    async fn execute(&self, params: Value, _context: &ActionContext) -> ActionResult {
        ActionResult::success(params)
    }
}

/// Counts its invocations in the shared workflow context and exits through
/// `done` once `params.limit` is reached.
pub struct LoopCounter(ActionDefinition);

impl LoopCounter {
    pub fn handle() -> Arc<dyn Action> {
        Arc::new(Self(
            ActionDefinition::action("test.loop_counter", "Loop Counter")
                .with_output_ports(["main", "done"]),
        ))
    }
}

#[async_trait]
impl Action for LoopCounter {
    fn definition(&self) -> &ActionDefinition {
        &self.0
    }

    async fn execute(&self, params: Value, context: &ActionContext) -> ActionResult {
        let limit = params.get("limit").and_then(Value::as_u64).unwrap_or(1);
        let count = context
            .execution
            .state
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            + 1;

        let mut updates = serde_json::Map::new();
        updates.insert("count".into(), json!(count));
        let port = if count >= limit { "done" } else { "main" };
        ActionResult::success_with_context(json!({"count": count}), port, updates)
    }
}

/// Always fails with `action_error`.
pub struct AlwaysFails(ActionDefinition);

impl AlwaysFails {
    pub fn handle() -> Arc<dyn Action> {
        Arc::new(Self(ActionDefinition::action("test.fail", "Always Fails")))
    }
}

#[async_trait]
impl Action for AlwaysFails {
    fn definition(&self) -> &ActionDefinition {
        &self.0
    }

    async fn execute(&self, _params: Value, _context: &ActionContext) -> ActionResult {
        ActionResult::failure(ErrorData::new("action_error", "always fails"))
    }
}

/// Fails on the first call, succeeds afterwards.
pub struct Flaky {
    definition: ActionDefinition,
    calls: AtomicU32,
}

impl Flaky {
    pub fn handle() -> Arc<dyn Action> {
        Arc::new(Self {
            definition: ActionDefinition::action("test.flaky", "Flaky"),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Action for Flaky {
    fn definition(&self) -> &ActionDefinition {
        &self.definition
    }

    async fn execute(&self, _params: Value, _context: &ActionContext) -> ActionResult {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            ActionResult::failure(ErrorData::new("action_error", "transient failure"))
        } else {
            ActionResult::success(json!({"ok": true}))
        }
    }
}

/// Suspends on a webhook; its resume completes with the callback data.
pub struct Webhook(ActionDefinition);

impl Webhook {
    pub fn handle() -> Arc<dyn Action> {
        Arc::new(Self(ActionDefinition::action("test.webhook", "Webhook")))
    }
}

#[async_trait]
impl Action for Webhook {
    fn definition(&self) -> &ActionDefinition {
        &self.0
    }

    async fn execute(&self, _params: Value, _context: &ActionContext) -> ActionResult {
        let payload = WebhookSuspension {
            resume_url: "u".into(),
            webhook_id: "w".into(),
            timeout_seconds: None,
            metadata: json!({}),
        };
        ActionResult::suspend(SuspensionType::Webhook, payload.to_value())
    }

    async fn resume(
        &self,
        _params: Value,
        _context: &ActionContext,
        resume_data: Value,
    ) -> ActionResult {
        ActionResult::success_with_port(resume_data, "main")
    }
}

/// Stores preparation data before the first step.
pub struct Prepared(ActionDefinition);

impl Prepared {
    pub fn handle() -> Arc<dyn Action> {
        Arc::new(Self(ActionDefinition::action("test.prepared", "Prepared")))
    }
}

#[async_trait]
impl Action for Prepared {
    fn definition(&self) -> &ActionDefinition {
        &self.0
    }

    async fn execute(&self, _params: Value, _context: &ActionContext) -> ActionResult {
        ActionResult::success(json!(null))
    }

    async fn prepare(&self, _params: &Value) -> Result<Option<Value>, ErrorData> {
        Ok(Some(json!({"warmed": true})))
    }
}

/// Fails pre-flight preparation.
pub struct PrepFails(ActionDefinition);

impl PrepFails {
    pub fn handle() -> Arc<dyn Action> {
        Arc::new(Self(ActionDefinition::action("test.prep_fail", "Prep Fails")))
    }
}

#[async_trait]
impl Action for PrepFails {
    fn definition(&self) -> &ActionDefinition {
        &self.0
    }

    async fn execute(&self, _params: Value, _context: &ActionContext) -> ActionResult {
        ActionResult::success(json!(null))
    }

    async fn prepare(&self, _params: &Value) -> Result<Option<Value>, ErrorData> {
        Err(ErrorData::new("missing_credentials", "no credentials configured"))
    }
}

/// Registry with every stub registered.
pub fn full_registry() -> Arc<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    registry.register(Echo::trigger());
    registry.register(Echo::action());
    registry.register(Emit::handle());
    registry.register(LoopCounter::handle());
    registry.register(AlwaysFails::handle());
    registry.register(Flaky::handle());
    registry.register(Webhook::handle());
    registry.register(Prepared::handle());
    registry.register(PrepFails::handle());
    Arc::new(registry)
}

/// Executor over the full stub registry.
pub fn executor() -> GraphExecutor {
    GraphExecutor::new(full_registry())
}
