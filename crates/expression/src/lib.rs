#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Pulsar Expression
//!
//! Template evaluation capability for the Pulsar workflow engine.
//!
//! The engine treats the template language as a black box behind the
//! [`Evaluator`] trait: `evaluate(template, context) → value`. This crate
//! ships a deliberately small default, [`TemplateEvaluator`], which resolves
//! `{{ dotted.path }}` expressions against the per-step evaluation context
//! (`input`, `nodes`, `vars`, `env`, `workflow`, `execution`). Hosts that
//! want a richer language implement [`Evaluator`] themselves and hand it to
//! the engine.
//!
//! Two rules every implementation must keep:
//!
//! - Missing paths resolve to `null`, never to an error.
//! - Non-string parameter leaves pass through untouched
//!   (see [`render_params`]).

pub mod context;
pub mod evaluator;
pub mod params;

pub use context::EvaluationContext;
pub use evaluator::{Evaluator, TemplateEvaluator};
pub use params::render_params;
