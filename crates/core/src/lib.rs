#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Pulsar Core
//!
//! Core identifiers and shared types for the Pulsar workflow engine.
//! This crate provides the fundamental building blocks used by all other
//! Pulsar crates.
//!
//! ## Key Components
//!
//! - **Identifiers**: [`ExecutionId`], [`WorkflowId`] — strongly-typed UUID
//!   wrappers that cannot be mixed up at compile time
//! - **Keys**: [`NodeKey`], [`PortKey`] — author-chosen string keys for nodes
//!   and their connection ports
//! - **Errors**: [`ErrorData`] — the structured `{code, message, details}`
//!   error value carried through results, audit records, and failed
//!   executions

pub mod error;
pub mod id;
pub mod keys;

pub use error::ErrorData;
pub use id::{ExecutionId, WorkflowId};
pub use keys::{NodeKey, PortKey};
