//! Request entities and links.

use bytes::Bytes;
use http::Method;
use mime::Mime;
use serde::Serialize;
use std::fmt;
use trellis_core::{ProcessingError, ProcessingResult};

/// A request body with its media type.
///
/// # Example
///
/// ```
/// use trellis_client::Entity;
///
/// let entity = Entity::json(&serde_json::json!({"name": "widget"})).unwrap();
/// assert_eq!(entity.media_type(), &mime::APPLICATION_JSON);
/// assert_eq!(entity.body().as_ref(), br#"{"name":"widget"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    body: Bytes,
    media_type: Mime,
}

impl Entity {
    /// Creates an entity.
    #[must_use]
    pub fn new(body: impl Into<Bytes>, media_type: Mime) -> Self {
        Self {
            body: body.into(),
            media_type,
        }
    }

    /// Creates a `text/plain` entity.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(body.into(), mime::TEXT_PLAIN_UTF_8)
    }

    /// Creates an `application/json` entity.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> ProcessingResult<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| ProcessingError::processing_with_source("Failed to serialize JSON entity", e))?;
        Ok(Self::new(body, mime::APPLICATION_JSON))
    }

    /// Creates an `application/x-www-form-urlencoded` entity.
    pub fn form<T: Serialize + ?Sized>(value: &T) -> ProcessingResult<Self> {
        let body = serde_urlencoded::to_string(value)
            .map_err(|e| ProcessingError::processing_with_source("Failed to encode form entity", e))?;
        Ok(Self::new(body, mime::APPLICATION_WWW_FORM_URLENCODED))
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the media type.
    #[must_use]
    pub fn media_type(&self) -> &Mime {
        &self.media_type
    }

    /// Splits into body and media type.
    #[must_use]
    pub fn into_parts(self) -> (Bytes, Mime) {
        (self.body, self.media_type)
    }
}

/// A typed web link: a URI with the method and media types to use it with.
///
/// # Example
///
/// ```
/// use http::Method;
/// use trellis_client::Link;
///
/// let link = Link::new("http://example.com/items")
///     .method(Method::POST)
///     .consumes(mime::APPLICATION_JSON)
///     .produces(mime::APPLICATION_JSON);
///
/// assert_eq!(link.http_method(), Some(&Method::POST));
/// assert_eq!(link.to_string(), "<http://example.com/items>; method=\"POST\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    uri: String,
    method: Option<Method>,
    produces: Vec<Mime>,
    consumes: Vec<Mime>,
}

impl Link {
    /// Creates a link without method or media types.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: None,
            produces: Vec::new(),
            consumes: Vec::new(),
        }
    }

    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a media type the linked resource produces.
    #[must_use]
    pub fn produces(mut self, media_type: Mime) -> Self {
        self.produces.push(media_type);
        self
    }

    /// Adds a media type the linked resource consumes.
    #[must_use]
    pub fn consumes(mut self, media_type: Mime) -> Self {
        self.consumes.push(media_type);
        self
    }

    /// Returns the URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the method.
    #[must_use]
    pub fn http_method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// Returns the produced media types.
    #[must_use]
    pub fn produced(&self) -> &[Mime] {
        &self.produces
    }

    /// Returns the consumed media types.
    #[must_use]
    pub fn consumed(&self) -> &[Mime] {
        &self.consumes
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.uri)?;
        if let Some(method) = &self.method {
            write!(f, "; method=\"{method}\"")?;
        }
        Ok(())
    }
}

/// Returns `true` if two media types are compatible.
///
/// A wildcard type or subtype on either side matches anything. Parameters
/// are ignored.
///
/// ```
/// use trellis_client::is_compatible;
///
/// assert!(is_compatible(&mime::APPLICATION_JSON, &mime::STAR_STAR));
/// assert!(is_compatible(&mime::TEXT_PLAIN_UTF_8, &mime::TEXT_STAR));
/// assert!(!is_compatible(&mime::TEXT_PLAIN, &mime::APPLICATION_JSON));
/// ```
#[must_use]
pub fn is_compatible(a: &Mime, b: &Mime) -> bool {
    let types = a.type_() == mime::STAR || b.type_() == mime::STAR || a.type_() == b.type_();
    let subtypes =
        a.subtype() == mime::STAR || b.subtype() == mime::STAR || a.subtype() == b.subtype();
    types && subtypes
}
