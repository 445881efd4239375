#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Pulsar Action
//!
//! The action contract and registry for the Pulsar workflow engine.
//!
//! An *action* is the unit of behavior a workflow node binds to via its
//! `type` string (`"http.request"`, `"logic.if"`). This crate defines:
//!
//! - [`ActionDefinition`] — static metadata: key, kind, input/output ports,
//!   optional params schema
//! - [`Action`] — the object-safe async trait actions implement
//!   (`execute`, optional `resume` and `prepare`)
//! - [`ActionResult`] — the closed result protocol
//!   (success / suspend / failure)
//! - [`SuspensionType`] and the typed suspension payloads
//!   (webhook, interval, schedule, sub-workflow, retry)
//! - [`ActionContext`] — the per-step view handed to every invocation
//! - [`ActionRegistry`] — key → `Arc<dyn Action>` lookup

pub mod action;
pub mod context;
pub mod definition;
pub mod registry;
pub mod result;
pub mod suspension;

pub use action::Action;
pub use context::{ActionContext, ExecutionRef, WorkflowRef};
pub use definition::{ActionDefinition, ActionKind};
pub use registry::ActionRegistry;
pub use result::ActionResult;
pub use suspension::{
    IntervalSuspension, RetrySuspension, ScheduleSuspension, SubWorkflowSuspension,
    SuspensionType, WebhookSuspension,
};
