//! Pipeline metrics.
//!
//! Metrics go through the `metrics` facade. Applications install whatever
//! recorder they like (Prometheus, StatsD, ...); without one every call here
//! is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Counter of finished invocations.
pub const INVOCATIONS_TOTAL: &str = "trellis_invocations_total";

/// Histogram of invocation latency.
pub const INVOCATION_DURATION_SECONDS: &str = "trellis_invocation_duration_seconds";

/// Counter of non-terminal invocation events.
pub const INVOCATION_EVENTS_TOTAL: &str = "trellis_invocation_events_total";

/// Which side of the pipeline recorded the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Outbound client invocations.
    Client,
    /// Inbound server invocations.
    Server,
}

impl Side {
    /// Returns the label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

/// Terminal outcome of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A response was produced.
    Completed,
    /// The invocation failed.
    Failed,
}

impl Outcome {
    /// Returns the label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Registers metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(INVOCATIONS_TOTAL, "Total number of finished invocations");
    describe_histogram!(
        INVOCATION_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Invocation latency from dispatch to terminal outcome"
    );
    describe_counter!(
        INVOCATION_EVENTS_TOTAL,
        "Suspend, resume and cancel events emitted by invocations"
    );
}

/// Records the terminal outcome of one invocation.
pub fn record_outcome(side: Side, outcome: Outcome, elapsed: Duration) {
    counter!(INVOCATIONS_TOTAL, "side" => side.as_str(), "outcome" => outcome.as_str())
        .increment(1);
    histogram!(INVOCATION_DURATION_SECONDS, "side" => side.as_str()).record(elapsed.as_secs_f64());
}

/// Records a non-terminal invocation event.
pub fn record_event(side: Side, event: &'static str) {
    counter!(INVOCATION_EVENTS_TOTAL, "side" => side.as_str(), "event" => event).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_values() {
        assert_eq!(Side::Client.as_str(), "client");
        assert_eq!(Side::Server.as_str(), "server");
        assert_eq!(Outcome::Completed.as_str(), "completed");
        assert_eq!(Outcome::Failed.as_str(), "failed");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics();
        record_outcome(Side::Server, Outcome::Completed, Duration::from_millis(3));
        record_event(Side::Client, "cancelled");
    }
}
