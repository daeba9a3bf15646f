//! The server-side response.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use trellis_core::{ProcessingError, ProcessingResult, RequestId};

/// Message returned for server errors when details are hidden.
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

/// A response produced by the server pipeline.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use trellis_server::ContainerResponse;
///
/// let response = ContainerResponse::text(StatusCode::OK, "42");
/// let http = response.into_http();
/// assert_eq!(http.status(), StatusCode::OK);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerResponse {
    status: StatusCode,
    headers: HeaderMap,
    entity: Bytes,
}

impl ContainerResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            entity: Bytes::new(),
        }
    }

    /// Creates an empty `200 OK` response.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Creates a `text/plain` response.
    #[must_use]
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status).with_entity(body.into(), &mime::TEXT_PLAIN_UTF_8)
    }

    /// Creates an `application/json` response.
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> ProcessingResult<Self> {
        let entity = serde_json::to_vec(body).map_err(|e| {
            ProcessingError::processing_with_source("Failed to serialize response entity", e)
        })?;
        Ok(Self::new(status).with_entity(entity, &mime::APPLICATION_JSON))
    }

    /// Creates the JSON error envelope response for an error.
    ///
    /// Server errors carry a generic message unless `include_details` is set.
    #[must_use]
    pub fn from_error(error: &ProcessingError, request_id: Option<RequestId>, include_details: bool) -> Self {
        let id = request_id.map(|id| id.to_string());
        let mut envelope = error.to_envelope(id.as_deref());
        if error.status_code().is_server_error() && !include_details {
            envelope.message = INTERNAL_ERROR_MESSAGE.to_string();
        }

        let entity = serde_json::to_vec(&serde_json::json!({ "error": envelope }))
            .unwrap_or_default();
        Self::new(error.status_code()).with_entity(entity, &mime::APPLICATION_JSON)
    }

    /// Sets the entity and its media type.
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<Bytes>, media_type: &mime::Mime) -> Self {
        if let Ok(value) = HeaderValue::from_str(media_type.as_ref()) {
            self.headers.insert(CONTENT_TYPE, value);
        }
        self.entity = entity.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Returns the status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the `Content-Type` as a media type.
    #[must_use]
    pub fn media_type(&self) -> Option<mime::Mime> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    }

    /// Returns the entity.
    #[must_use]
    pub fn entity(&self) -> &Bytes {
        &self.entity
    }

    /// Replaces the entity.
    pub fn set_entity(&mut self, entity: Bytes) {
        self.entity = entity;
    }

    /// Takes the entity, leaving an empty one.
    pub fn take_entity(&mut self) -> Bytes {
        std::mem::take(&mut self.entity)
    }

    /// Converts into an `http` response.
    #[must_use]
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.entity.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        if !self.entity.is_empty() && !response.headers().contains_key(CONTENT_LENGTH) {
            response
                .headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(self.entity.len()));
        }
        response
    }
}
