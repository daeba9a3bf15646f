//! Stages of the client chain.
//!
//! ```text
//! InitializationStage -> ClientFilteringStage -> ConnectingStage
//! ```

use crate::connector::Connector;
use crate::filter::{ClientFilterAction, ClientFilters};
use crate::request::{ClientProperties, ClientRequest};
use crate::response::ClientResponse;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::HeaderValue;
use mime::Mime;
use std::sync::Arc;
use trellis_core::{BoxFuture, ProcessingError, ProcessingResult};
use trellis_process::{Continuation, Stage};

type ClientContinuation = Continuation<ClientRequest, ClientResponse>;

/// Applies client defaults to a request.
///
/// Requests without accepted media types get the configured defaults.
/// `Accept` and `Content-Type` headers are derived from the request unless
/// already set. The client properties are attached to the request.
#[derive(Debug, Clone)]
pub struct InitializationStage {
    default_accept: Vec<Mime>,
    properties: ClientProperties,
}

impl InitializationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(default_accept: Vec<Mime>, properties: ClientProperties) -> Self {
        Self {
            default_accept,
            properties,
        }
    }
}

impl Stage<ClientRequest, ClientResponse> for InitializationStage {
    fn name(&self) -> &'static str {
        "client-initialization"
    }

    fn apply(&self, mut request: ClientRequest) -> BoxFuture<'_, ProcessingResult<ClientContinuation>> {
        Box::pin(async move {
            if request.accept().is_empty() && !self.default_accept.is_empty() {
                request.set_accept(self.default_accept.clone());
            }

            if !request.accept().is_empty() && !request.headers().contains_key(ACCEPT) {
                let accept = request.accept().iter().map(Mime::to_string).collect::<Vec<_>>().join(", ");
                let value = HeaderValue::from_str(&accept)
                    .map_err(|e| ProcessingError::processing_with_source("Invalid Accept header", e))?;
                request.headers_mut().insert(ACCEPT, value);
            }

            let content_type = request
                .entity()
                .filter(|_| !request.headers().contains_key(CONTENT_TYPE))
                .map(|entity| HeaderValue::from_str(entity.media_type().as_ref()));
            if let Some(value) = content_type {
                let value = value
                    .map_err(|e| ProcessingError::processing_with_source("Invalid Content-Type header", e))?;
                request.headers_mut().insert(CONTENT_TYPE, value);
            }

            request.properties_mut().insert(self.properties.clone());
            Ok(Continuation::Done(request))
        })
    }
}

/// Runs the client request filters.
///
/// A filter that aborts ends the chain with its response, after the
/// response filters ran on it.
#[derive(Debug)]
pub struct ClientFilteringStage {
    filters: Arc<ClientFilters>,
}

impl ClientFilteringStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(filters: Arc<ClientFilters>) -> Self {
        Self { filters }
    }
}

impl Stage<ClientRequest, ClientResponse> for ClientFilteringStage {
    fn name(&self) -> &'static str {
        "client-filtering"
    }

    fn apply(&self, mut request: ClientRequest) -> BoxFuture<'_, ProcessingResult<ClientContinuation>> {
        Box::pin(async move {
            match self.filters.filter_request(&mut request).await? {
                ClientFilterAction::Continue => Ok(Continuation::Done(request)),
                ClientFilterAction::Abort(mut response) => {
                    self.filters.filter_response(request.head(), &mut response).await?;
                    Ok(Continuation::Respond(response))
                }
            }
        })
    }
}

/// The terminal stage: sends the request through the connector and runs
/// the response filters on the result.
pub struct ConnectingStage {
    connector: Arc<dyn Connector>,
    filters: Arc<ClientFilters>,
}

impl ConnectingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, filters: Arc<ClientFilters>) -> Self {
        Self { connector, filters }
    }
}

impl Stage<ClientRequest, ClientResponse> for ConnectingStage {
    fn name(&self) -> &'static str {
        "connecting"
    }

    fn apply(&self, request: ClientRequest) -> BoxFuture<'_, ProcessingResult<ClientContinuation>> {
        Box::pin(async move {
            let head = request.head().clone();
            tracing::debug!(
                request_id = %head.request_id(),
                connector = self.connector.name(),
                method = %head.method(),
                uri = %head.uri(),
                "sending client request"
            );

            let mut response = self.connector.apply(request).await?;
            self.filters.filter_response(&head, &mut response).await?;
            Ok(Continuation::Respond(response))
        })
    }
}

impl std::fmt::Debug for ConnectingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectingStage")
            .field("connector", &self.connector.name())
            .field("filters", &self.filters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use http::Method;
    use std::collections::BTreeMap;

    fn request() -> ClientRequest {
        ClientRequest::new(Method::POST, "http://localhost/items".parse().unwrap())
    }

    #[tokio::test]
    async fn test_initialization_applies_defaults() {
        let properties = ClientProperties(BTreeMap::from([("tenant".to_string(), "acme".to_string())]));
        let stage = InitializationStage::new(vec![mime::APPLICATION_JSON, mime::TEXT_PLAIN], properties);

        let continuation = stage.apply(request().with_entity(Entity::text("x"))).await.unwrap();
        let Continuation::Done(request) = continuation else {
            panic!("initialization must pass the request on");
        };

        assert_eq!(request.headers()[ACCEPT], "application/json, text/plain");
        assert_eq!(request.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(
            request.properties().get::<ClientProperties>().and_then(|p| p.get("tenant")),
            Some("acme")
        );
    }

    #[tokio::test]
    async fn test_initialization_keeps_explicit_accept() {
        let stage = InitializationStage::new(vec![mime::APPLICATION_JSON], ClientProperties::default());
        let continuation = stage.apply(request().with_accept(mime::TEXT_HTML)).await.unwrap();
        let Continuation::Done(request) = continuation else {
            panic!("initialization must pass the request on");
        };

        assert_eq!(request.accept(), &[mime::TEXT_HTML]);
        assert_eq!(request.headers()[ACCEPT], "text/html");
        assert!(!request.headers().contains_key(CONTENT_TYPE));
    }

    #[tokio::test]
    async fn test_filtering_without_filters_continues() {
        let stage = ClientFilteringStage::new(Arc::new(ClientFilters::default()));
        let continuation = stage.apply(request()).await.unwrap();
        assert!(matches!(continuation, Continuation::Done(_)));
    }
}
