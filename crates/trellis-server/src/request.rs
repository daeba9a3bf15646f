//! The server-side request.

use crate::routing::RoutingContext;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use trellis_core::{ProcessingError, ProcessingResult, Properties, RequestId};
use trellis_extract::{ExtractError, ExtractionSource, MultivaluedMap, MultivaluedParameterExtractor};
use trellis_process::PipelineRequest;
use trellis_router::Params;

/// The parts of a request that outlive its entity.
///
/// Response filters see the head of the request that produced the response.
#[derive(Debug, Clone)]
pub struct RequestHead {
    request_id: RequestId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    base_path: String,
}

impl RequestHead {
    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the base path the application is mounted under.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

/// A request travelling through the server pipeline.
///
/// Owned by one invocation and moved from stage to stage. It carries its
/// own [`RoutingContext`], so routing state is never shared between
/// requests.
///
/// # Example
///
/// ```
/// use http::Method;
/// use trellis_server::ContainerRequest;
///
/// let request = ContainerRequest::new(Method::GET, "/api/items/42?expand=tags".parse().unwrap())
///     .with_base_path("/api");
///
/// assert_eq!(request.relative_path(), Some("/items/42"));
/// assert_eq!(request.query().first("expand"), Some("tags"));
/// ```
pub struct ContainerRequest {
    head: RequestHead,
    entity: Bytes,
    query: MultivaluedMap,
    properties: Properties,
    routing: RoutingContext,
    suspend_timeout: Option<Duration>,
}

impl ContainerRequest {
    /// Creates a request without entity.
    ///
    /// A malformed query string is treated as empty.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = parse_query(&uri).unwrap_or_default();
        Self {
            head: RequestHead {
                request_id: RequestId::new(),
                method,
                uri,
                headers: HeaderMap::new(),
                base_path: String::new(),
            },
            entity: Bytes::new(),
            query,
            properties: Properties::new(),
            routing: RoutingContext::new(),
            suspend_timeout: None,
        }
    }

    /// Converts an `http` request.
    ///
    /// Fails with [`ProcessingError::IllegalArgument`] if the query string
    /// cannot be decoded.
    pub fn from_http(request: http::Request<Bytes>) -> ProcessingResult<Self> {
        let (parts, entity) = request.into_parts();
        let query = parse_query(&parts.uri)?;

        let mut request = Self::new(parts.method, parts.uri);
        request.head.headers = parts.headers;
        request.entity = entity;
        request.query = query;
        Ok(request)
    }

    /// Sets the base path.
    #[must_use]
    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.head.base_path = base_path.trim_end_matches('/').to_string();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.head.headers.append(name, value);
        self
    }

    /// Sets the entity.
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<Bytes>) -> Self {
        self.entity = entity.into();
        self
    }

    /// Returns the request head.
    #[must_use]
    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.head.request_id
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the request URI.
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

    /// Returns the `Content-Type` as a media type.
    #[must_use]
    pub fn media_type(&self) -> Option<mime::Mime> {
        self.headers()
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

    /// Deserializes the entity as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> ProcessingResult<T> {
        serde_json::from_slice(&self.entity).map_err(|e| {
            ProcessingError::web_application(
                http::StatusCode::BAD_REQUEST,
                format!("Invalid JSON entity: {e}"),
            )
        })
    }

    /// Returns the decoded query parameters.
    #[must_use]
    pub fn query(&self) -> &MultivaluedMap {
        &self.query
    }

    /// Returns the query parameters as they appear in the URI.
    #[must_use]
    pub fn encoded_query(&self) -> MultivaluedMap {
        let mut map = MultivaluedMap::new(ExtractionSource::Query);
        let pairs = self.head.uri.query().unwrap_or_default().split('&');
        for pair in pairs.filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            map.add(name, value);
        }
        map
    }

    /// Returns the path below the base path.
    ///
    /// Returns `None` if the request is not under the base path.
    #[must_use]
    pub fn relative_path(&self) -> Option<&str> {
        let path = self.head.uri.path();
        let rest = path.strip_prefix(self.head.base_path.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest.trim_end_matches('/'))
        } else {
            None
        }
    }

    /// Returns the percent-decoded path parameters bound so far, outermost
    /// first.
    ///
    /// A value that does not decode to UTF-8 is kept as matched.
    #[must_use]
    pub fn path_params(&self) -> Params {
        let mut params = Params::new();
        for (name, value) in self.encoded_path_params().iter() {
            params.push(name, decode_component(value));
        }
        params
    }

    /// Returns the path parameters exactly as matched, outermost first.
    #[must_use]
    pub fn encoded_path_params(&self) -> Params {
        let mut params = Params::new();
        for result in self.routing.matched_results().rev() {
            params.extend_from(result.params());
        }
        params
    }

    /// Extracts a path parameter, decoded unless the extractor is encoded.
    pub fn extract_path<T: 'static>(
        &self,
        extractor: &MultivaluedParameterExtractor<T>,
    ) -> Result<Option<T>, ExtractError> {
        if extractor.is_encoded() {
            extractor.extract(&self.encoded_path_params())
        } else {
            extractor.extract(&self.path_params())
        }
    }

    /// Extracts a query parameter, decoded unless the extractor is encoded.
    pub fn extract_query<T: 'static>(
        &self,
        extractor: &MultivaluedParameterExtractor<T>,
    ) -> Result<Option<T>, ExtractError> {
        if extractor.is_encoded() {
            extractor.extract(&self.encoded_query())
        } else {
            extractor.extract(&self.query)
        }
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

    /// Returns the routing context.
    #[must_use]
    pub fn routing(&self) -> &RoutingContext {
        &self.routing
    }

    /// Returns the routing context for modification.
    pub fn routing_mut(&mut self) -> &mut RoutingContext {
        &mut self.routing
    }

    /// Returns the default timeout for suspending this request.
    #[must_use]
    pub fn suspend_timeout(&self) -> Option<Duration> {
        self.suspend_timeout
    }

    pub(crate) fn set_suspend_timeout(&mut self, timeout: Option<Duration>) {
        self.suspend_timeout = timeout;
    }
}

impl PipelineRequest for ContainerRequest {
    fn request_id(&self) -> RequestId {
        self.head.request_id
    }
}

impl fmt::Debug for ContainerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerRequest")
            .field("request_id", &self.head.request_id)
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("entity_len", &self.entity.len())
            .field("routing", &self.routing)
            .finish_non_exhaustive()
    }
}

fn decode_component(value: &str) -> String {
    urlencoding::decode(value).map_or_else(|_| value.to_string(), Cow::into_owned)
}

fn parse_query(uri: &Uri) -> ProcessingResult<MultivaluedMap> {
    let Some(query) = uri.query() else {
        return Ok(MultivaluedMap::new(ExtractionSource::Query));
    };

    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query).map_err(|e| {
        ProcessingError::illegal_argument(format!("Malformed query string '{query}': {e}"))
    })?;
    Ok(MultivaluedMap::query(pairs))
}
