//! The client and its builder.

use crate::connector::Connector;
use crate::entity::{is_compatible, Entity, Link};
use crate::executors::ClientExecutorsFactory;
use crate::filter::{ClientFilters, ClientProvider};
use crate::request::{ClientProperties, ClientRequest};
use crate::response::ClientResponse;
use crate::stages::{ClientFilteringStage, ConnectingStage, InitializationStage};
use crate::target::{PreparedInvocation, WebTarget};
use http::{Method, Uri};
use mime::Mime;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use trellis_config::{ClientConfig, TrellisConfig};
use trellis_core::{ProcessingError, ProcessingResult, ProviderPartition};
use trellis_process::{Invocation, RequestInvoker, Stages};
use trellis_telemetry::Side;

type ClientInvoker = RequestInvoker<ClientRequest, ClientResponse>;

struct ClientInner {
    invoker: RwLock<Option<ClientInvoker>>,
    connector: Mutex<Option<Arc<dyn Connector>>>,
    providers: Mutex<Vec<Arc<dyn ClientProvider>>>,
    config: ClientConfig,
    closed: AtomicBool,
}

/// Entry point for building and sending client requests.
///
/// Cloning a client is cheap; clones share the chain, the connector and the
/// closed state.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use http::StatusCode;
/// use trellis_client::{Client, ClientRequest, ClientResponse, Connector};
/// use trellis_core::ProcessingResult;
///
/// struct Fixed;
///
/// #[async_trait]
/// impl Connector for Fixed {
///     fn name(&self) -> &str {
///         "fixed"
///     }
///
///     async fn apply(&self, _request: ClientRequest) -> ProcessingResult<ClientResponse> {
///         Ok(ClientResponse::new(StatusCode::OK).with_entity("pong", &mime::TEXT_PLAIN))
///     }
/// }
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let client = Client::builder().connector(Arc::new(Fixed)).build().unwrap();
/// let response = client
///     .target("http://localhost:8080")
///     .unwrap()
///     .path("ping")
///     .request()
///     .get()
///     .await
///     .unwrap();
/// assert_eq!(response.text().unwrap(), "pong");
/// # });
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a target for a URI.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::IllegalState`] after [`close`](Self::close).
    pub fn target(&self, uri: impl Into<String>) -> ProcessingResult<WebTarget> {
        self.check_open()?;
        Ok(WebTarget::new(self.clone(), uri.into()))
    }

    /// Creates a target for the URI of a link.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::IllegalState`] after [`close`](Self::close).
    pub fn target_link(&self, link: &Link) -> ProcessingResult<WebTarget> {
        self.target(link.uri())
    }

    /// Prepares an invocation of a link without entity.
    ///
    /// The link's produced media types become the accepted ones.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::IllegalArgument`] if the link has no
    /// method or its method needs an entity (`POST`, `PUT`), and
    /// [`ProcessingError::IllegalState`] after [`close`](Self::close).
    pub fn invocation(&self, link: &Link) -> ProcessingResult<PreparedInvocation> {
        self.check_open()?;
        let method = link_method(link)?;
        if method == Method::POST || method == Method::PUT {
            return Err(ProcessingError::illegal_argument(format!(
                "Missing entity in invocation created from link {link}"
            )));
        }

        let request = link_request(method, link)?;
        Ok(PreparedInvocation::new(self.clone(), request))
    }

    /// Prepares an invocation of a link with an entity.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::IllegalArgument`] if the link has no
    /// method or the entity media type is not compatible with any media type
    /// the link consumes, and [`ProcessingError::IllegalState`] after
    /// [`close`](Self::close).
    pub fn invocation_with_entity(&self, link: &Link, entity: Entity) -> ProcessingResult<PreparedInvocation> {
        self.check_open()?;
        let method = link_method(link)?;
        if !link
            .consumed()
            .iter()
            .any(|consumed| is_compatible(entity.media_type(), consumed))
        {
            return Err(ProcessingError::illegal_argument(format!(
                "Entity type {} incompatible with link {link}",
                entity.media_type()
            )));
        }

        let request = link_request(method, link)?.with_entity(entity);
        Ok(PreparedInvocation::new(self.clone(), request))
    }

    /// Returns the client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::IllegalState`] after [`close`](Self::close).
    pub fn config(&self) -> ProcessingResult<ClientConfig> {
        self.check_open()?;
        Ok(self.inner.config.clone())
    }

    /// Returns the registered filter providers. Empty after close.
    #[must_use]
    pub fn providers(&self) -> Vec<Arc<dyn ClientProvider>> {
        self.inner.providers.lock().clone()
    }

    /// Closes the client.
    ///
    /// The first call closes the connector and releases the chain and the
    /// registered providers. Later calls do nothing.
    pub fn close(&self) {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let invoker = self.inner.invoker.write().take();
        drop(invoker);
        let connector = self.inner.connector.lock().take();
        if let Some(connector) = &connector {
            connector.close();
        }
        let providers = std::mem::take(&mut *self.inner.providers.lock());

        tracing::info!(
            connector = connector.as_ref().map(|c| c.name().to_string()),
            providers = providers.len(),
            "client closed"
        );
    }

    /// Returns `true` once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) async fn submit(&self, request: ClientRequest) -> ProcessingResult<Invocation<ClientResponse>> {
        let invoker = self.inner.invoker.read().clone().ok_or_else(closed)?;
        Ok(invoker.apply(request).await)
    }

    fn check_open(&self) -> ProcessingResult<()> {
        if self.is_closed() {
            return Err(closed());
        }
        Ok(())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("providers", &self.inner.providers.lock().len())
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn closed() -> ProcessingError {
    ProcessingError::illegal_state("Client instance has been closed.")
}

fn link_method(link: &Link) -> ProcessingResult<Method> {
    link.http_method()
        .cloned()
        .ok_or_else(|| ProcessingError::illegal_argument(format!("Cannot create invocation from link {link}")))
}

fn link_request(method: Method, link: &Link) -> ProcessingResult<ClientRequest> {
    let uri = parse_uri(link.uri())?;
    let mut request = ClientRequest::new(method, uri);
    request.set_accept(link.produced().to_vec());
    Ok(request)
}

pub(crate) fn parse_uri(uri: &str) -> ProcessingResult<Uri> {
    uri.parse()
        .map_err(|_| ProcessingError::illegal_argument(format!("Invalid target URI: {uri}")))
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    connector: Option<Arc<dyn Connector>>,
    config: TrellisConfig,
    providers: Vec<Arc<dyn ClientProvider>>,
}

impl ClientBuilder {
    /// Sets the connector.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: TrellisConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a provider.
    #[must_use]
    pub fn register(mut self, provider: Arc<dyn ClientProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Fails without a connector, if the configuration is invalid, or if it
    /// selects a runtime executor outside of a Tokio runtime.
    pub fn build(self) -> ProcessingResult<Client> {
        let connector = self
            .connector
            .ok_or_else(|| ProcessingError::illegal_state("A client cannot be built without a connector"))?;
        self.config.validate().map_err(|e| {
            ProcessingError::processing_with_source("Invalid client configuration", e)
        })?;

        let default_accept = self
            .config
            .client
            .default_accept
            .iter()
            .map(|media_type| media_type.parse::<Mime>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProcessingError::processing_with_source("Invalid default accept media type", e))?;

        let mut providers = self.providers;
        let configured = self.config.executors.provider().map_err(|e| {
            ProcessingError::processing_with_source("Invalid executor configuration", e)
        })?;
        if let Some(configured) = configured {
            providers.push(Arc::new(configured));
        }

        let (executor_providers, general) = ProviderPartition::partition(providers).into_parts();
        let executors = ClientExecutorsFactory::new(&executor_providers);
        let filters = Arc::new(ClientFilters::from_providers(&general));

        let config = self.config.client;
        let initialization = InitializationStage::new(default_accept, ClientProperties(config.properties.clone()));
        let root = Stages::chain(initialization)
            .to(ClientFilteringStage::new(filters.clone()))
            .build(Arc::new(ConnectingStage::new(connector.clone(), filters.clone())));

        tracing::info!(
            connector = connector.name(),
            filters = ?filters,
            executors = ?executors.factory(),
            "client built"
        );

        let invoker = RequestInvoker::builder(root)
            .executors(Arc::new(executors))
            .side(Side::Client)
            .build();

        Ok(Client {
            inner: Arc::new(ClientInner {
                invoker: RwLock::new(Some(invoker)),
                connector: Mutex::new(Some(connector)),
                providers: Mutex::new(general),
                config,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("connector", &self.connector.as_ref().map(|c| c.name().to_string()))
            .field("providers", &self.providers.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::StatusCode;

    struct Ok200;

    #[async_trait]
    impl Connector for Ok200 {
        fn name(&self) -> &str {
            "ok"
        }

        async fn apply(&self, _request: ClientRequest) -> ProcessingResult<ClientResponse> {
            Ok(ClientResponse::new(StatusCode::OK))
        }
    }

    fn client() -> Client {
        Client::builder().connector(Arc::new(Ok200)).build().unwrap()
    }

    #[test]
    fn test_build_without_connector_fails() {
        let error = Client::builder().build().unwrap_err();
        assert!(error.is_illegal_state());
    }

    #[test]
    fn test_invalid_default_accept_fails() {
        let mut config = TrellisConfig::default();
        config.client.default_accept = vec!["not a media type".to_string()];
        let result = Client::builder().connector(Arc::new(Ok200)).config(config).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invocation_takes_accept_from_link() {
        let link = Link::new("http://localhost/items")
            .method(Method::GET)
            .produces(mime::APPLICATION_JSON);
        let invocation = client().invocation(&link).unwrap();
        assert_eq!(invocation.request().method(), Method::GET);
        assert_eq!(invocation.request().accept(), &[mime::APPLICATION_JSON]);
    }

    #[test]
    fn test_invocation_rejects_invalid_uri() {
        let link = Link::new("http://exa mple.com").method(Method::GET);
        let error = client().invocation(&link).unwrap_err();
        assert!(matches!(error, ProcessingError::IllegalArgument { .. }));
    }

    #[test]
    fn test_config_after_close() {
        let client = client();
        assert!(client.config().is_ok());
        client.close();
        assert!(client.config().unwrap_err().is_illegal_state());
        assert!(client.target("http://localhost").unwrap_err().is_illegal_state());
    }
}
