//! Observability for the Trellis dispatch engine.
//!
//! - **Logging**: structured logs through `tracing-subscriber`, JSON for
//!   production and pretty output for development
//! - **Metrics**: invocation counters and latency histograms through the
//!   `metrics` facade; recording is free when no recorder is installed
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `trellis_invocations_total` | Counter | `side`, `outcome` | Finished invocations |
//! | `trellis_invocation_duration_seconds` | Histogram | `side` | Invocation latency |
//! | `trellis_invocation_events_total` | Counter | `side`, `event` | Suspend/resume/cancel events |

#![doc(html_root_url = "https://docs.rs/trellis-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{describe_metrics, record_event, record_outcome, Outcome, Side};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
