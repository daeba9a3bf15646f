//! Extraction error types.

use http::StatusCode;
use std::fmt;
use thiserror::Error;
use trellis_core::ProcessingError;

/// Where a parameter value was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    /// Path template variables (e.g., `/items/{id}`)
    Path,
    /// Query string parameters
    Query,
    /// HTTP headers
    Header,
    /// Form fields
    Form,
    /// Anything else
    Other,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Query => write!(f, "query"),
            Self::Header => write!(f, "header"),
            Self::Form => write!(f, "form"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// An HTTP error raised by application conversion code.
///
/// A conversion that fails with this error is not turned into an extraction
/// error; it reaches the caller unchanged.
///
/// # Example
///
/// ```rust
/// use trellis_extract::WebApplicationError;
/// use http::StatusCode;
///
/// let error = WebApplicationError::new(StatusCode::GONE, "order archived");
/// assert_eq!(error.status(), StatusCode::GONE);
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct WebApplicationError {
    status: StatusCode,
    message: String,
}

impl WebApplicationError {
    /// Creates a web application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while converting parameter text.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The conversion of a non-empty value failed.
    #[error("Cannot convert '{value}' to {target}: {source}")]
    Extraction {
        /// Name of the target type.
        target: &'static str,
        /// The text that failed to convert.
        value: String,
        /// The conversion failure.
        #[source]
        source: anyhow::Error,
    },

    /// The conversion raised an HTTP error.
    #[error(transparent)]
    WebApplication(#[from] WebApplicationError),

    /// A parameter value could not be converted.
    #[error("Invalid {source_kind} parameter '{name}': {error}")]
    Parameter {
        /// Where the value came from.
        source_kind: ExtractionSource,
        /// Parameter name.
        name: String,
        /// The underlying failure.
        #[source]
        error: Box<ExtractError>,
    },

    /// No strategy can convert text into the target type.
    #[error("No string reader registered for {target}")]
    NoReader {
        /// Name of the target type.
        target: &'static str,
    },
}

impl ExtractError {
    /// Returns the innermost error, looking through parameter context.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Parameter { error, .. } => error.root(),
            other => other,
        }
    }
}

impl From<ExtractError> for ProcessingError {
    fn from(error: ExtractError) -> Self {
        if let ExtractError::WebApplication(web) = error.root() {
            return Self::web_application(web.status(), web.message());
        }
        if matches!(error.root(), ExtractError::NoReader { .. }) {
            return Self::processing(error.to_string());
        }
        Self::extraction(error.to_string(), error)
    }
}
