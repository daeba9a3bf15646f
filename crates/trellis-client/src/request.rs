//! The client-side request.

use crate::entity::Entity;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use mime::Mime;
use std::collections::BTreeMap;
use std::fmt;
use trellis_core::{Properties, RequestId};
use trellis_process::PipelineRequest;

/// The parts of a request a response filter sees.
#[derive(Debug, Clone)]
pub struct ClientRequestHead {
    request_id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl ClientRequestHead {
    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the target URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Client configuration properties copied onto every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientProperties(pub BTreeMap<String, String>);

impl ClientProperties {
    /// Returns a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// A request travelling through the client pipeline.
///
/// # Example
///
/// ```
/// use http::Method;
/// use trellis_client::{ClientRequest, Entity};
///
/// let request = ClientRequest::new(Method::POST, "http://example.com/items".parse().unwrap())
///     .with_accept(mime::APPLICATION_JSON)
///     .with_entity(Entity::text("widget"));
///
/// assert_eq!(request.accept(), &[mime::APPLICATION_JSON]);
/// assert!(request.entity().is_some());
/// ```
pub struct ClientRequest {
    head: ClientRequestHead,
    entity: Option<Entity>,
    accept: Vec<Mime>,
    properties: Properties,
}

impl ClientRequest {
    /// Creates a request without entity.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            head: ClientRequestHead {
                request_id: RequestId::new(),
                method,
                uri,
                headers: HeaderMap::new(),
            },
            entity: None,
            accept: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Sets the entity.
    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Adds an accepted media type.
    #[must_use]
    pub fn with_accept(mut self, media_type: Mime) -> Self {
        self.accept.push(media_type);
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.head.headers.append(name, value);
        self
    }

    /// Returns the request head.
    #[must_use]
    pub fn head(&self) -> &ClientRequestHead {
        &self.head
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.head.request_id
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the target URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Returns the headers for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.head.headers
    }

    /// Returns the entity.
    #[must_use]
    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    /// Replaces the entity.
    pub fn set_entity(&mut self, entity: Option<Entity>) {
        self.entity = entity;
    }

    /// Takes the entity.
    pub fn take_entity(&mut self) -> Option<Entity> {
        self.entity.take()
    }

    /// Returns the accepted media types.
    #[must_use]
    pub fn accept(&self) -> &[Mime] {
        &self.accept
    }

    /// Replaces the accepted media types.
    pub fn set_accept(&mut self, accept: Vec<Mime>) {
        self.accept = accept;
    }

    /// Returns the request properties.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Returns the request properties for modification.
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }
}

impl PipelineRequest for ClientRequest {
    fn request_id(&self) -> RequestId {
        self.head.request_id
    }
}

impl fmt::Debug for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRequest")
            .field("request_id", &self.head.request_id)
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("accept", &self.accept)
            .field("entity", &self.entity.as_ref().map(Entity::media_type))
            .finish_non_exhaustive()
    }
}
