//! Web targets, invocation builders and prepared invocations.
//!
//! Errors leaving this module through [`PreparedInvocation`] and the
//! shortcut methods of [`InvocationBuilder`] are normalized into
//! [`InvocationError`], so callers only ever deal with one error type.

use crate::client::{parse_uri, Client};
use crate::entity::Entity;
use crate::request::ClientRequest;
use crate::response::ClientResponse;
use http::{HeaderName, HeaderValue, Method};
use mime::Mime;
use std::time::Duration;
use tokio::task::JoinHandle;
use trellis_core::{InvocationError, ProcessingError, ProcessingResult, Properties};
use trellis_process::{Invocation, InvocationCallback};

/// A resource URI to build requests for.
///
/// Targets are immutable: [`path`](Self::path) and
/// [`query_param`](Self::query_param) return new targets.
#[derive(Debug, Clone)]
pub struct WebTarget {
    client: Client,
    uri: String,
    query: Vec<(String, String)>,
}

impl WebTarget {
    pub(crate) fn new(client: Client, uri: String) -> Self {
        Self {
            client,
            uri,
            query: Vec::new(),
        }
    }

    /// Returns the target URI including query parameters.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.query.is_empty() {
            return self.uri.clone();
        }
        let query = serde_urlencoded::to_string(&self.query).unwrap_or_default();
        format!("{}?{query}", self.uri)
    }

    /// Appends a path segment, inserting a single `/` between the parts.
    #[must_use]
    pub fn path(&self, segment: &str) -> Self {
        let mut target = self.clone();
        let segment = segment.trim_start_matches('/');
        if !segment.is_empty() {
            if !target.uri.ends_with('/') {
                target.uri.push('/');
            }
            target.uri.push_str(segment);
        }
        target
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query_param(&self, name: impl Into<String>, value: impl ToString) -> Self {
        let mut target = self.clone();
        target.query.push((name.into(), value.to_string()));
        target
    }

    /// Starts building a request.
    #[must_use]
    pub fn request(&self) -> InvocationBuilder {
        InvocationBuilder {
            client: self.client.clone(),
            uri: self.uri(),
            headers: Vec::new(),
            accept: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Starts building a request accepting the given media types.
    #[must_use]
    pub fn request_accepting(&self, accept: impl IntoIterator<Item = Mime>) -> InvocationBuilder {
        let mut builder = self.request();
        builder.accept.extend(accept);
        builder
    }
}

/// Builds a request for a [`WebTarget`].
pub struct InvocationBuilder {
    client: Client,
    uri: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    accept: Vec<Mime>,
    properties: Properties,
}

impl InvocationBuilder {
    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Adds an accepted media type.
    #[must_use]
    pub fn accept(mut self, media_type: Mime) -> Self {
        self.accept.push(media_type);
        self
    }

    /// Attaches a typed property to the request.
    #[must_use]
    pub fn property<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.properties.insert(value);
        self
    }

    /// Prepares an invocation without entity.
    ///
    /// # Errors
    ///
    /// Fails on an invalid URI or a closed client.
    pub fn build(self, method: Method) -> ProcessingResult<PreparedInvocation> {
        self.prepare(method, None)
    }

    /// Prepares an invocation with an entity.
    ///
    /// # Errors
    ///
    /// Fails on an invalid URI or a closed client.
    pub fn build_with_entity(self, method: Method, entity: Entity) -> ProcessingResult<PreparedInvocation> {
        self.prepare(method, Some(entity))
    }

    /// Sends a `GET` request.
    pub async fn get(self) -> Result<ClientResponse, InvocationError> {
        self.method(Method::GET, None).await
    }

    /// Sends a `DELETE` request.
    pub async fn delete(self) -> Result<ClientResponse, InvocationError> {
        self.method(Method::DELETE, None).await
    }

    /// Sends a `POST` request.
    pub async fn post(self, entity: Entity) -> Result<ClientResponse, InvocationError> {
        self.method(Method::POST, Some(entity)).await
    }

    /// Sends a `PUT` request.
    pub async fn put(self, entity: Entity) -> Result<ClientResponse, InvocationError> {
        self.method(Method::PUT, Some(entity)).await
    }

    /// Sends a request with any method.
    pub async fn method(self, method: Method, entity: Option<Entity>) -> Result<ClientResponse, InvocationError> {
        self.prepare(method, entity)
            .map_err(InvocationError::from_processing)?
            .invoke()
            .await
    }

    fn prepare(self, method: Method, entity: Option<Entity>) -> ProcessingResult<PreparedInvocation> {
        if self.client.is_closed() {
            return Err(ProcessingError::illegal_state("Client instance has been closed."));
        }

        let mut request = ClientRequest::new(method, parse_uri(&self.uri)?);
        for (name, value) in self.headers {
            request.headers_mut().append(name, value);
        }
        request.set_accept(self.accept);
        request.set_entity(entity);
        *request.properties_mut() = self.properties;
        Ok(PreparedInvocation::new(self.client, request))
    }
}

impl std::fmt::Debug for InvocationBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationBuilder")
            .field("uri", &self.uri)
            .field("accept", &self.accept)
            .finish_non_exhaustive()
    }
}

/// A request ready to be sent.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use http::{Method, StatusCode};
/// use trellis_client::{Client, ClientRequest, ClientResponse, Connector, Link};
/// use trellis_core::ProcessingResult;
///
/// struct Teapot;
///
/// #[async_trait]
/// impl Connector for Teapot {
///     fn name(&self) -> &str {
///         "teapot"
///     }
///
///     async fn apply(&self, _request: ClientRequest) -> ProcessingResult<ClientResponse> {
///         Ok(ClientResponse::new(StatusCode::IM_A_TEAPOT))
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let client = Client::builder().connector(Arc::new(Teapot)).build().unwrap();
/// let link = Link::new("http://localhost/brew").method(Method::GET);
///
/// let response = client.invocation(&link).unwrap().invoke().await.unwrap();
/// assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
/// # });
/// ```
#[derive(Debug)]
pub struct PreparedInvocation {
    client: Client,
    request: ClientRequest,
}

impl PreparedInvocation {
    pub(crate) fn new(client: Client, request: ClientRequest) -> Self {
        Self { client, request }
    }

    /// Returns the prepared request.
    #[must_use]
    pub fn request(&self) -> &ClientRequest {
        &self.request
    }

    /// Returns the prepared request for modification.
    pub fn request_mut(&mut self) -> &mut ClientRequest {
        &mut self.request
    }

    /// Sends the request and waits for the response.
    pub async fn invoke(self) -> Result<ClientResponse, InvocationError> {
        self.submit()
            .await?
            .outcome()
            .await
            .map_err(InvocationError::from_processing)
    }

    /// Sends the request and returns the invocation handle.
    ///
    /// Events of the returned handle carry raw pipeline errors.
    pub async fn submit(self) -> Result<Invocation<ClientResponse>, InvocationError> {
        self.client
            .submit(self.request)
            .await
            .map_err(InvocationError::from_processing)
    }

    /// Sends the request and delivers its events to `callback` on a
    /// spawned task.
    ///
    /// Failures reach [`InvocationCallback::failed`] as
    /// [`ProcessingError::Invocation`]. The task returns the callback once
    /// the terminal event was delivered.
    ///
    /// # Errors
    ///
    /// Fails outside of a Tokio runtime, or if the client is closed.
    pub async fn submit_with<C>(self, callback: C) -> Result<JoinHandle<C>, InvocationError>
    where
        C: InvocationCallback<ClientResponse> + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            InvocationError::from_processing(ProcessingError::illegal_state(
                "Callback delivery requires a Tokio runtime",
            ))
        })?;
        let invocation = self.submit().await?;

        Ok(handle.spawn(async move {
            let mut normalizing = Normalizing(callback);
            invocation.deliver(&mut normalizing).await;
            normalizing.0
        }))
    }
}

/// Wraps failures into [`ProcessingError::Invocation`] before handing them
/// to the inner callback.
struct Normalizing<C>(C);

impl<C: InvocationCallback<ClientResponse>> InvocationCallback<ClientResponse> for Normalizing<C> {
    fn completed(&mut self, response: ClientResponse) {
        self.0.completed(response);
    }

    fn failed(&mut self, error: ProcessingError) {
        self.0
            .failed(ProcessingError::Invocation(InvocationError::from_processing(error)));
    }

    fn cancelled(&mut self) {
        self.0.cancelled();
    }

    fn suspended(&mut self, timeout: Option<Duration>) {
        self.0.suspended(timeout);
    }

    fn suspend_timeout_changed(&mut self, timeout: Option<Duration>) {
        self.0.suspend_timeout_changed(timeout);
    }

    fn resumed(&mut self) {
        self.0.resumed();
    }
}
