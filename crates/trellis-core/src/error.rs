//! Error types for Trellis.
//!
//! [`ProcessingError`] is raised anywhere inside the pipeline: by stages,
//! inflectors, providers and the routing layer. It never escapes to client
//! callers directly; the client boundary normalizes every failure into an
//! [`InvocationError`].
//!
//! | Variant | Raised when |
//! |---|---|
//! | `Processing` | A stage or provider failed unexpectedly |
//! | `Extraction` | A parameter value could not be converted |
//! | `WebApplication` | Application code signalled an HTTP error |
//! | `IllegalArgument` | A request was built from structurally invalid input |
//! | `IllegalState` | An operation ran against a closed client or misused routing state |
//! | `Invocation` | A lower layer already produced a client boundary error |
//! | `Cancelled` | The invocation was cancelled |
//! | `SuspendTimeout` | A suspended invocation was not resumed in time |
//! | `Abandoned` | The pipeline dropped an invocation without an outcome |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`ProcessingError`].
pub type ProcessingResult<T> = Result<T, ProcessingError>;

/// Standard error type for the Trellis pipeline.
///
/// # Example
///
/// ```
/// use trellis_core::ProcessingError;
/// use http::StatusCode;
///
/// let error = ProcessingError::illegal_state("Client instance has been closed.");
/// assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
/// assert!(error.to_string().contains("closed"));
/// ```
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// A stage or provider failed unexpectedly.
    #[error("Processing error: {message}")]
    Processing {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A string parameter could not be converted into its target type.
    #[error("Extraction error: {message}")]
    Extraction {
        /// Human-readable error message.
        message: String,
        /// The conversion failure.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Application code signalled an HTTP error response.
    #[error("Web application error ({status}): {message}")]
    WebApplication {
        /// Status code to respond with.
        status: StatusCode,
        /// Human-readable error message.
        message: String,
    },

    /// A request could not be constructed from the given arguments.
    #[error("Illegal argument: {message}")]
    IllegalArgument {
        /// Human-readable error message.
        message: String,
    },

    /// An operation was attempted in a state that does not allow it.
    #[error("Illegal state: {message}")]
    IllegalState {
        /// Human-readable error message.
        message: String,
    },

    /// A client boundary error produced by a lower layer.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// The invocation was cancelled before it produced a response.
    #[error("Invocation cancelled")]
    Cancelled,

    /// A suspended invocation was not resumed before its timeout elapsed.
    #[error("Suspended invocation timed out after {timeout:?}")]
    SuspendTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The invocation was dropped without a terminal outcome.
    #[error("Invocation abandoned without a response")]
    Abandoned,
}

impl ProcessingError {
    /// Creates a processing error with a message.
    #[must_use]
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a processing error with a source error.
    pub fn processing_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Processing {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an extraction error wrapping the conversion failure.
    pub fn extraction(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Extraction {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a web application error with an explicit status.
    #[must_use]
    pub fn web_application(status: StatusCode, message: impl Into<String>) -> Self {
        Self::WebApplication {
            status,
            message: message.into(),
        }
    }

    /// Creates an illegal argument error.
    #[must_use]
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    /// Creates an illegal state error.
    #[must_use]
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Returns `true` for errors raised because an operation ran after close.
    #[must_use]
    pub const fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }

    /// Returns the HTTP status code a server responds with for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::WebApplication { status, .. } => *status,
            Self::Extraction { .. } => StatusCode::NOT_FOUND,
            Self::IllegalArgument { .. } => StatusCode::BAD_REQUEST,
            Self::SuspendTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Processing { .. }
            | Self::IllegalState { .. }
            | Self::Invocation(_)
            | Self::Cancelled
            | Self::Abandoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Processing { .. } => "PROCESSING_ERROR",
            Self::Extraction { .. } => "EXTRACTION_ERROR",
            Self::WebApplication { .. } => "WEB_APPLICATION_ERROR",
            Self::IllegalArgument { .. } => "ILLEGAL_ARGUMENT",
            Self::IllegalState { .. } => "ILLEGAL_STATE",
            Self::Invocation(_) => "INVOCATION_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::SuspendTimeout { .. } => "SUSPEND_TIMEOUT",
            Self::Abandoned => "ABANDONED",
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.error_code().to_string(),
            message: self.to_string(),
            status: self.status_code().as_u16(),
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// The error family surfaced to client callers.
///
/// Whatever layer of the client pipeline fails, the caller sees exactly one
/// error type that exposes a message and the original cause.
///
/// # Example
///
/// ```
/// use trellis_core::{InvocationError, ProcessingError};
///
/// let cause = ProcessingError::processing("connection reset");
/// let error = InvocationError::from_processing(cause);
/// assert!(error.message().contains("connection reset"));
/// ```
#[derive(Error, Debug)]
#[error("Invocation failed: {message}")]
pub struct InvocationError {
    message: String,
    #[source]
    source: Option<Box<ProcessingError>>,
}

impl InvocationError {
    /// Creates an invocation error with a message and no cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Normalizes a pipeline error into the client boundary type.
    ///
    /// An error that already is an invocation error is returned unchanged,
    /// anything else is wrapped with its message preserved.
    #[must_use]
    pub fn from_processing(error: ProcessingError) -> Self {
        match error {
            ProcessingError::Invocation(inner) => inner,
            other => Self {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the wrapped pipeline error, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&ProcessingError> {
        self.source.as_deref()
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code.
    pub status: u16,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_application_status_passthrough() {
        let error = ProcessingError::web_application(StatusCode::CONFLICT, "duplicate");
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.error_code(), "WEB_APPLICATION_ERROR");
    }

    #[test]
    fn test_extraction_maps_to_not_found() {
        let error = ProcessingError::extraction("bad id", anyhow::anyhow!("invalid digit"));
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_invocation_error_wraps_other_errors() {
        let error = InvocationError::from_processing(ProcessingError::processing("boom"));
        assert!(error.message().contains("boom"));
        assert!(matches!(error.cause(), Some(ProcessingError::Processing { .. })));
    }

    #[test]
    fn test_invocation_error_is_not_rewrapped() {
        let original = InvocationError::new("connector refused");
        let error = InvocationError::from_processing(ProcessingError::Invocation(original));
        assert_eq!(error.message(), "connector refused");
        assert!(error.cause().is_none());
    }

    #[test]
    fn test_error_envelope_serialization() {
        let error = ProcessingError::illegal_argument("missing method");
        let envelope = error.to_envelope(Some("req-456"));

        let json = serde_json::to_string(&envelope).expect("serialization should work");
        assert!(json.contains("\"code\":\"ILLEGAL_ARGUMENT\""));
        assert!(json.contains("\"status\":400"));
        assert!(json.contains("\"request_id\":\"req-456\""));
    }

    #[test]
    fn test_suspend_timeout_is_service_unavailable() {
        let error = ProcessingError::SuspendTimeout {
            timeout: Duration::from_millis(50),
        };
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
