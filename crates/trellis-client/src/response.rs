//! The client-side response.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use trellis_core::{ProcessingError, ProcessingResult};

/// A response returned by a connector.
///
/// # Example
///
/// ```
/// use http::StatusCode;
/// use trellis_client::ClientResponse;
///
/// let response = ClientResponse::new(StatusCode::OK).with_entity("hello", &mime::TEXT_PLAIN);
/// assert!(response.is_success());
/// assert_eq!(response.text().unwrap(), "hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    status: StatusCode,
    headers: HeaderMap,
    entity: Bytes,
}

impl ClientResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            entity: Bytes::new(),
        }
    }

    /// Converts an `http` response.
    #[must_use]
    pub fn from_http(response: http::Response<Bytes>) -> Self {
        let (parts, entity) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            entity,
        }
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

    /// Returns `true` for `2xx` statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
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

    /// Reads the entity as UTF-8 text.
    pub fn text(&self) -> ProcessingResult<String> {
        String::from_utf8(self.entity.to_vec())
            .map_err(|e| ProcessingError::processing_with_source("Response entity is not UTF-8", e))
    }

    /// Deserializes the entity as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ProcessingResult<T> {
        serde_json::from_slice(&self.entity)
            .map_err(|e| ProcessingError::processing_with_source("Invalid JSON response entity", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http() {
        let http = http::Response::builder()
            .status(StatusCode::CREATED)
            .header(CONTENT_TYPE, "application/json")
            .body(Bytes::from_static(br#"{"id":3}"#))
            .unwrap();

        let response = ClientResponse::from_http(http);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.media_type(), Some(mime::APPLICATION_JSON));
        assert_eq!(response.json::<serde_json::Value>().unwrap()["id"], 3);
    }

    #[test]
    fn test_invalid_utf8_text() {
        let response = ClientResponse::new(StatusCode::OK).with_entity(vec![0xff, 0xfe], &mime::TEXT_PLAIN);
        assert!(response.text().is_err());
    }
}
