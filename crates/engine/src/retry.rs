//! Retry policy decisions.

use chrono::{Duration, Utc};
use pulsar_action::RetrySuspension;
use pulsar_core::ErrorData;
use pulsar_workflow::NodeSettings;

/// Decide whether a failed attempt should be retried.
///
/// `current_attempt` is 0 for the initial run and equals the retry
/// suspension's `attempt_number` on re-runs. Retries apply only to errors,
/// never to suspensions.
#[must_use]
pub fn should_retry(settings: &NodeSettings, current_attempt: u32) -> bool {
    settings.retry_on_failed
        && settings.max_retries > 0
        && current_attempt < settings.max_retries
}

/// Build the internal retry suspension payload for a failed attempt.
///
/// The host scheduler wakes the execution at `resume_at` and calls
/// `resume(execution, {})`; the engine then re-executes the node counting
/// from `attempt_number`.
#[must_use]
pub fn build_retry_suspension(
    settings: &NodeSettings,
    current_attempt: u32,
    original_error: ErrorData,
) -> RetrySuspension {
    RetrySuspension {
        attempt_number: current_attempt + 1,
        max_attempts: settings.max_retries,
        retry_delay_ms: settings.retry_delay_ms,
        resume_at: Utc::now() + Duration::milliseconds(settings.retry_delay_ms as i64),
        original_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn retrying(max_retries: u32) -> NodeSettings {
        NodeSettings::default().with_retries(max_retries, 10)
    }

    #[rstest]
    #[case(retrying(2), 0, true)]
    #[case(retrying(2), 1, true)]
    #[case(retrying(2), 2, false)] // ceiling reached
    #[case(retrying(0), 0, false)] // zero budget
    #[case(NodeSettings::default(), 0, false)] // retries disabled
    fn retry_decision(
        #[case] settings: NodeSettings,
        #[case] attempt: u32,
        #[case] expected: bool,
    ) {
        assert_eq!(should_retry(&settings, attempt), expected);
    }

    #[test]
    fn disabled_flag_wins_over_budget() {
        let mut settings = NodeSettings::default().with_retries(3, 10);
        settings.retry_on_failed = false;
        assert!(!should_retry(&settings, 0));
    }

    #[test]
    fn suspension_counts_from_current_attempt() {
        let settings = retrying(3);
        let payload =
            build_retry_suspension(&settings, 1, ErrorData::new("action_error", "boom"));
        assert_eq!(payload.attempt_number, 2);
        assert_eq!(payload.max_attempts, 3);
        assert_eq!(payload.retry_delay_ms, 10);
        assert_eq!(payload.original_error.code, "action_error");
    }

    #[test]
    fn resume_at_is_delay_in_the_future() {
        let settings = NodeSettings::default().with_retries(1, 60_000);
        let before = Utc::now();
        let payload = build_retry_suspension(&settings, 0, ErrorData::new("e", "m"));
        let delta = payload.resume_at - before;
        assert!(delta >= Duration::milliseconds(60_000));
        assert!(delta < Duration::milliseconds(61_000));
    }
}
