//! Suspension tags and typed payload shapes.
//!
//! A suspension is a controlled pause of the workflow awaiting an external
//! event. The audit record stores the payload as an opaque JSON map plus a
//! string tag; the structs here give hosts and actions a typed way to build
//! those payloads.

use chrono::{DateTime, Utc};
use pulsar_core::ErrorData;
use serde::{Deserialize, Serialize};

/// What an execution is waiting for.
///
/// Serializes as a plain snake_case string so the wire format stays an open
/// set; hosts may define their own tags via [`SuspensionType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SuspensionType {
    /// Waiting for an inbound HTTP callback.
    Webhook,
    /// Waiting for a fixed delay to elapse.
    Interval,
    /// Waiting for a scheduled point in time.
    Schedule,
    /// Waiting for a child workflow execution to finish.
    SubWorkflow,
    /// Internal: waiting for a retry delay after a failure.
    Retry,
    /// Host-defined suspension kind.
    Custom(String),
}

impl SuspensionType {
    /// The wire tag for this suspension type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Webhook => "webhook",
            Self::Interval => "interval",
            Self::Schedule => "schedule",
            Self::SubWorkflow => "sub_workflow",
            Self::Retry => "retry",
            Self::Custom(tag) => tag,
        }
    }

    /// Returns `true` for the engine-internal retry suspension.
    #[must_use]
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry)
    }
}

impl From<String> for SuspensionType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "webhook" => Self::Webhook,
            "interval" => Self::Interval,
            "schedule" => Self::Schedule,
            "sub_workflow" => Self::SubWorkflow,
            "retry" => Self::Retry,
            _ => Self::Custom(tag),
        }
    }
}

impl From<SuspensionType> for String {
    fn from(t: SuspensionType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for SuspensionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Payload shapes ──────────────────────────────────────────────────────────

/// Payload for a `webhook` suspension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookSuspension {
    /// URL the external system must call to resume the execution.
    pub resume_url: String,
    /// Identifier the callback must carry.
    pub webhook_id: String,
    /// Optional timeout after which the host may expire the wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// Free-form host metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Payload for an `interval` suspension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalSuspension {
    /// How long to wait, in seconds.
    pub duration_seconds: u64,
    /// When the wait began.
    pub started_at: DateTime<Utc>,
    /// Absolute time the host scheduler should resume at.
    pub resume_at: DateTime<Utc>,
    /// Free-form host metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Payload for a `schedule` suspension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSuspension {
    /// The point in time to resume at.
    pub scheduled_at: DateTime<Utc>,
    /// Optional IANA timezone the schedule was expressed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Optional cron expression for recurring schedules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron_expression: Option<String>,
    /// Free-form host metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Payload for a `sub_workflow` suspension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubWorkflowSuspension {
    /// The child execution the parent is waiting on.
    pub sub_workflow_execution_id: String,
    /// The child workflow definition.
    pub sub_workflow_id: String,
    /// How the child runs (`sync`, `async`, `fire_and_forget`).
    pub execution_mode: String,
    /// When the child was started.
    pub started_at: DateTime<Utc>,
    /// Free-form host metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Payload for the engine-internal `retry` suspension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySuspension {
    /// The attempt number the resumed run will carry (1-based).
    pub attempt_number: u32,
    /// Configured retry ceiling for the node.
    pub max_attempts: u32,
    /// Configured delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Absolute time the host scheduler should resume at.
    pub resume_at: DateTime<Utc>,
    /// The error that triggered the retry.
    pub original_error: ErrorData,
}

macro_rules! impl_payload_to_value {
    ($($ty:ty),+ $(,)?) => {
        $(impl $ty {
            /// The opaque map form stored on the audit record.
            #[must_use]
            pub fn to_value(&self) -> serde_json::Value {
                serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
            }
        })+
    };
}

impl_payload_to_value!(
    WebhookSuspension,
    IntervalSuspension,
    ScheduleSuspension,
    SubWorkflowSuspension,
    RetrySuspension,
);
